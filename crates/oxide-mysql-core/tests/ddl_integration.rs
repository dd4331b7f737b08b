//! DDL generated for the music schema.

mod common;

use common::{authors, music_group, songs};
use oxide_mysql_core::ddl::{create_foreign_keys, create_table, drop_foreign_keys, drop_table};
use oxide_mysql_core::SchemaGroup;

#[test]
fn songs_create_table() {
    let sql = create_table(&songs());

    assert_eq!(
        sql,
        "CREATE TABLE `songs` (\n  \
         `song_id` INT UNSIGNED NOT NULL AUTO_INCREMENT,\n  \
         `author_id` INT UNSIGNED NOT NULL,\n  \
         `title` VARCHAR(200) NOT NULL,\n  \
         `genre_id` SMALLINT UNSIGNED,\n  \
         `plays` BIGINT UNSIGNED NOT NULL DEFAULT 0,\n  \
         `explicit` TINYINT NOT NULL DEFAULT 0 COMMENT 'boolean value',\n  \
         `meta` JSON,\n  \
         `released_at` DATETIME DEFAULT CURRENT_TIMESTAMP,\n  \
         PRIMARY KEY (`song_id`),\n  \
         UNIQUE `uq_songs_author_id_title` (`author_id`, `title`)\n)"
    );
}

#[test]
fn authors_single_index() {
    let sql = create_table(&authors());
    assert!(sql.contains("INDEX `idx_authors_country` (`country`)"));
    assert!(!sql.contains("UNIQUE"));
}

#[test]
fn foreign_keys_round_trip_names() {
    let schema = songs();
    let created = create_foreign_keys(&schema);
    let dropped = drop_foreign_keys(&schema);

    assert_eq!(created.len(), 2);
    assert_eq!(dropped.len(), 2);
    assert!(created[0].contains("`fk_authors_songs_author_id`"));
    assert!(created[0].ends_with("ON DELETE CASCADE"));
    assert!(dropped[1].ends_with("DROP CONSTRAINT `fk_genres_songs_genre_id`"));
    assert!(create_foreign_keys(&authors()).is_empty());
    assert_eq!(drop_table(&schema), "DROP TABLE `songs`");
}

#[test]
fn schema_group_loads_from_json() {
    let json = serde_json::to_string(&vec![music_group()]).unwrap();
    let groups: Vec<SchemaGroup> = serde_json::from_str(&json).unwrap();

    assert_eq!(groups, vec![music_group()]);
    for table in &groups[0].tables {
        table.validate().unwrap();
        assert!(create_table(table).starts_with("CREATE TABLE"));
    }
}
