use pgmon::collectors::sql_files::{collect_sql_files, SearchConfig, SearchMode, SqlFilesError};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn sample_tree() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "init.sql", "CREATE TABLE users (id int);");
    write(root, "queries/users.sql", "SELECT * FROM users;");
    write(root, "queries/init.sql", "SELECT 1;");
    write(root, "queries/notes.txt", "not sql");
    write(root, "migrations/001_create.sql", "CREATE TABLE a (id int);");
    write(root, "migrations/002_alter.sql", "ALTER TABLE a ADD b int;");
    write(root, "db/003_migration_fix.sql", "UPDATE a SET b = 0;");
    dir
}

fn titles(config: &SearchConfig) -> Vec<String> {
    collect_sql_files(config)
        .unwrap()
        .into_iter()
        .map(|file| file.title)
        .collect()
}

#[test]
fn test_all_mode_skips_migrations_and_dedupes_titles() {
    let dir = sample_tree();
    let config = SearchConfig {
        root: dir.path().to_path_buf(),
        ..SearchConfig::default()
    };

    let files = collect_sql_files(&config).unwrap();
    let titles: Vec<&str> = files.iter().map(|f| f.title.as_str()).collect();
    assert_eq!(titles, vec!["init.sql", "init_queries.sql", "users.sql"]);
    assert!(files.iter().all(|f| !f.is_migration));
    assert_eq!(files[1].content, "SELECT 1;");
    assert_eq!(files[1].path, dir.path().join("queries/init.sql"));
}

#[test]
fn test_duplicate_at_root_gets_root_suffix() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a/init.sql", "SELECT 'a';");
    write(dir.path(), "init.sql", "SELECT 'root';");
    let config = SearchConfig {
        root: dir.path().to_path_buf(),
        ..SearchConfig::default()
    };
    assert_eq!(titles(&config), vec!["init.sql", "init_root.sql"]);
}

#[test]
fn test_unique_basenames_keep_their_names() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "x/y/orders.sql", "SELECT 1;");
    write(dir.path(), "z/customers.sql", "SELECT 2;");
    let config = SearchConfig {
        root: dir.path().to_path_buf(),
        ..SearchConfig::default()
    };
    assert_eq!(titles(&config), vec!["orders.sql", "customers.sql"]);
}

#[test]
fn test_migrations_mode_reads_migrations_dir() {
    let dir = sample_tree();
    let config = SearchConfig {
        root: dir.path().to_path_buf(),
        mode: SearchMode::MigrationsOnly,
        ..SearchConfig::default()
    };

    let files = collect_sql_files(&config).unwrap();
    let titles: Vec<&str> = files.iter().map(|f| f.title.as_str()).collect();
    assert_eq!(titles, vec!["001_create.sql", "002_alter.sql"]);
    assert!(files.iter().all(|f| f.is_migration));
}

#[test]
fn test_migrations_mode_with_custom_path() {
    let dir = sample_tree();
    write(dir.path(), "schema/changes/010.sql", "DROP TABLE a;");
    let config = SearchConfig {
        root: dir.path().to_path_buf(),
        mode: SearchMode::MigrationsOnly,
        migrations_path: Some("schema/changes".into()),
        ..SearchConfig::default()
    };
    assert_eq!(titles(&config), vec!["010.sql"]);
}

#[test]
fn test_specific_mode_matches_names_case_insensitively() {
    let dir = sample_tree();
    let config = SearchConfig {
        root: dir.path().to_path_buf(),
        mode: SearchMode::Specific,
        specific_files: vec!["USERS.sql".to_string(), "001_create.sql".to_string()],
        ..SearchConfig::default()
    };
    // Migrations are never picked up outside migrations mode.
    assert_eq!(titles(&config), vec!["users.sql"]);
}

#[test]
fn test_ignore_list_applies_only_when_enabled() {
    let dir = sample_tree();
    let mut config = SearchConfig {
        root: dir.path().to_path_buf(),
        ignore_files: vec!["users.sql".to_string()],
        ..SearchConfig::default()
    };
    assert!(titles(&config).contains(&"users.sql".to_string()));

    config.enable_ignore = true;
    assert_eq!(titles(&config), vec!["init.sql", "init_queries.sql"]);
}

#[test]
fn test_unresolvable_title_collision_fails() {
    let dir = tempfile::tempdir().unwrap();
    // Walk order: a/b/init.sql, a/init_a_b.sql, a_b/init.sql.
    write(dir.path(), "a/b/init.sql", "SELECT 1;");
    write(dir.path(), "a/init_a_b.sql", "SELECT 2;");
    write(dir.path(), "a_b/init.sql", "SELECT 3;");
    let config = SearchConfig {
        root: dir.path().to_path_buf(),
        ..SearchConfig::default()
    };

    match collect_sql_files(&config) {
        Err(SqlFilesError::TitleCollision { title, path }) => {
            assert_eq!(title, "init_a_b.sql");
            assert_eq!(path, dir.path().join("a_b/init.sql"));
        }
        other => panic!("expected a title collision, got {:?}", other),
    }
}

#[test]
fn test_empty_tree_yields_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let config = SearchConfig {
        root: dir.path().to_path_buf(),
        ..SearchConfig::default()
    };
    assert!(collect_sql_files(&config).unwrap().is_empty());
}

#[test]
fn test_non_utf8_file_is_collected_lossily() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "ok.sql", "SELECT 1;");
    // "SELECT 'Привет';" encoded as cp1251.
    let mut cp1251 = b"SELECT '".to_vec();
    cp1251.extend_from_slice(&[0xCF, 0xF0, 0xE8, 0xE2, 0xE5, 0xF2]);
    cp1251.extend_from_slice(b"';");
    fs::write(dir.path().join("cp1251.sql"), &cp1251).unwrap();

    let config = SearchConfig {
        root: dir.path().to_path_buf(),
        ..SearchConfig::default()
    };
    let files = collect_sql_files(&config).unwrap();
    let titles: Vec<&str> = files.iter().map(|f| f.title.as_str()).collect();
    assert_eq!(titles, vec!["cp1251.sql", "ok.sql"]);
    assert!(files[0].content.starts_with("SELECT '"));
    assert!(files[0].content.contains('\u{FFFD}'));
    assert_eq!(files[1].content, "SELECT 1;");
}
