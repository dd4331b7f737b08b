//! Mutation compilation across related tables.

mod common;

use chrono::NaiveDate;
use common::{assert_plan_params, authors, genres, songs};
use oxide_mysql_core::{
    Bind, CompileError, CompileOptions, Filter, Find, Mutation, Operator, Row, SqlValue,
};
use serde_json::json;

fn song(author: u32, title: &str) -> Row {
    Row::new()
        .set("author_id", author)
        .set("title", title)
        .set("meta", json!({"bpm": 120}))
}

#[test]
fn author_with_songs_batched() {
    let (authors, songs) = (authors(), songs());
    let debut = NaiveDate::from_ymd_opt(1999, 4, 1).unwrap();
    let plan = Mutation::insert(
        &authors,
        vec![Row::new().set("author_id", 1_u32).set("name", "Nina").set("debut", debut)],
    )
    .include(
        "songs",
        Mutation::insert(&songs, vec![song(1, "One"), song(1, "Two"), song(1, "Three")]),
    )
    .compile_with(CompileOptions::batched())
    .unwrap();

    assert_eq!(plan.tables.len(), 2);
    assert_eq!(plan.tables[0].table, "authors");
    assert_eq!(plan.tables[1].table, "songs");
    assert!(plan.requires_transaction());

    let songs_stmt = &plan.tables[1].statements[0];
    assert_eq!(
        songs_stmt.sql,
        "INSERT INTO `songs` (`author_id`, `title`, `meta`) VALUES ?"
    );
    match &songs_stmt.bind {
        Bind::Rows(rows) => {
            assert_eq!(rows.len(), 3);
            assert_eq!(rows[2][1], SqlValue::Text("Three".into()));
            assert_eq!(rows[0][2], SqlValue::Text(r#"{"bpm":120}"#.into()));
        }
        Bind::Values(_) => panic!("expected a batched statement"),
    }

    let author_stmt = &plan.tables[0].statements[0];
    assert_eq!(
        author_stmt.bind,
        Bind::Rows(vec![vec![
            SqlValue::UInt(1),
            SqlValue::Text("Nina".into()),
            SqlValue::Text("1999-04-01".into())
        ]])
    );
    assert_plan_params(&plan);
}

#[test]
fn mixed_field_sets_need_separate_statements() {
    let songs = songs();
    let plan = Mutation::insert(
        &songs,
        vec![
            song(1, "One"),
            Row::new().set("author_id", 1_u32).set("title", "Two"),
            song(1, "Three"),
        ],
    )
    .compile_with(CompileOptions::batched())
    .unwrap();

    let table = &plan.tables[0];
    assert!(table.needs_separate_statements);
    assert_eq!(table.statements.len(), 3);
    assert_plan_params(&plan);
}

#[test]
fn every_kind_keeps_params_aligned() {
    let (authors, songs, genres) = (authors(), songs(), genres());
    let plans = vec![
        Mutation::update(
            &songs,
            vec![Row::new().set("song_id", 5_u32).set("plays", 10).set("title", "x")],
        )
        .compile()
        .unwrap(),
        Mutation::upsert(&genres, vec![Row::new().set("genre_id", 1).set("label", "jazz")])
            .compile()
            .unwrap(),
        Mutation::add_upsert(&songs, vec![Row::new().set("song_id", 5).set("plays", 1)])
            .compile_with(CompileOptions::batched())
            .unwrap(),
        Mutation::delete(&songs, vec![Row::new().set("song_id", 5), Row::new().set("song_id", 6)])
            .compile()
            .unwrap(),
        Mutation::set_update(
            &songs,
            Row::new().set("explicit", true),
            Filter::new().or(vec![
                Filter::new().op("plays", Operator::Lt, 5),
                Filter::new().is_null("genre_id"),
            ]),
        )
        .compile()
        .unwrap(),
        Mutation::set_delete(&authors, Filter::new().eq("country", "XX"))
            .compile()
            .unwrap(),
        Mutation::set_insert(
            &genres,
            &["genre_id", "label"],
            Find::new(&genres)
                .select(&["genre_id", "label"])
                .filter(Filter::new().op("genre_id", Operator::Gt, 100)),
        )
        .compile()
        .unwrap(),
    ];

    for plan in &plans {
        assert!(!plan.is_empty());
        assert_plan_params(plan);
    }

    let update = &plans[0].tables[0].statements[0];
    assert_eq!(
        update.sql,
        "UPDATE `songs` SET `plays` = ?, `title` = ? WHERE `songs`.`song_id` = ?"
    );
    assert_eq!(plans[3].statement_count(), 2);
}

#[test]
fn set_update_requires_assignments() {
    let songs = songs();
    let err = Mutation::set_update(&songs, Row::new(), Filter::new())
        .compile()
        .unwrap_err();
    assert!(matches!(err, CompileError::InvalidDescriptor(_)));
}

#[test]
fn nested_mutations_of_the_same_table_merge() {
    let (authors, songs) = (authors(), songs());
    let plan = Mutation::insert(&songs, vec![song(1, "One")])
        .include(
            "author_id",
            Mutation::upsert(&authors, vec![Row::new().set("author_id", 1).set("name", "N")])
                .include("songs", Mutation::insert(&songs, vec![song(1, "Two")])),
        )
        .compile_with(CompileOptions::batched())
        .unwrap();

    let tables: Vec<_> = plan.tables.iter().map(|t| t.table.as_str()).collect();
    assert_eq!(tables, vec!["songs", "authors"]);
    assert_eq!(plan.tables[0].statements.len(), 1);
    assert_eq!(plan.tables[0].statements[0].row_count(), 2);
}
