use streamrelay::catalog::{CatalogRepository, JsonCatalog};

fn catalog(name: &str, documents: &[(&str, &str)]) -> JsonCatalog {
    let dir = std::env::temp_dir().join(format!("streamrelay-catalog-{}-{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    for (file, content) in documents {
        std::fs::write(dir.join(file), content).unwrap();
    }
    JsonCatalog::new(dir)
}

#[tokio::test]
async fn match_numeric_and_string_ids_alike() {
    let catalog = catalog(
        "ids",
        &[(
            "movies.json",
            r#"[{"tmdb_id": 550, "title": "Numeric"}, {"tmdb_id": "680", "title": "Text"}]"#,
        )],
    );

    let numeric = catalog.find_by_tmdb_id("550").await.unwrap().unwrap();
    let text = catalog.find_by_tmdb_id("680").await.unwrap().unwrap();

    assert_eq!(numeric.title.as_deref(), Some("Numeric"));
    assert_eq!(text.title.as_deref(), Some("Text"));
    assert!(catalog.find_by_tmdb_id("551").await.unwrap().is_none());
}

#[tokio::test]
async fn skip_documents_that_are_not_arrays() {
    let catalog = catalog(
        "skip",
        &[
            ("a.json", r#"{"tmdb_id": 1, "title": "object, not a list"}"#),
            ("b.json", "not json at all"),
            ("c.json", r#"[{"tmdb_id": 1, "title": "Listed", "url": "https://filemoon.example/e/x1"}]"#),
            ("notes.txt", r#"[{"tmdb_id": 2}]"#),
        ],
    );

    let found = catalog.find_by_tmdb_id("1").await.unwrap().unwrap();

    assert_eq!(found.title.as_deref(), Some("Listed"));
    assert_eq!(found.url.as_deref(), Some("https://filemoon.example/e/x1"));
    assert!(catalog.find_by_tmdb_id("2").await.unwrap().is_none());
    assert_eq!(catalog.document_count().await.unwrap(), 3);
}

#[tokio::test]
async fn keep_the_rest_of_a_document_when_one_row_is_off() {
    let catalog = catalog(
        "lenient",
        &[(
            "movies.json",
            r#"[
                "stray string",
                {"tmdb_id": 1, "title": 1984, "url": 42},
                {"tmdb_id": 550, "title": "Fight Club", "url": "https://filemoon.example/e/fc550"}
            ]"#,
        )],
    );

    let fight_club = catalog.find_by_tmdb_id("550").await.unwrap().unwrap();
    let odd = catalog.find_by_tmdb_id("1").await.unwrap().unwrap();

    assert_eq!(fight_club.title.as_deref(), Some("Fight Club"));
    assert_eq!(fight_club.url.as_deref(), Some("https://filemoon.example/e/fc550"));
    assert_eq!(odd.title.as_deref(), Some("1984"));
    assert_eq!(odd.url, None);
}

#[tokio::test]
async fn search_documents_in_name_order() {
    let catalog = catalog(
        "order",
        &[
            ("b.json", r#"[{"tmdb_id": 7, "title": "second"}]"#),
            ("a.json", r#"[{"tmdb_id": 7, "title": "first"}]"#),
        ],
    );

    let found = catalog.find_by_tmdb_id("7").await.unwrap().unwrap();
    assert_eq!(found.title.as_deref(), Some("first"));
}

#[tokio::test]
async fn fail_when_the_folder_is_missing() {
    let catalog = JsonCatalog::new(std::env::temp_dir().join("streamrelay-no-such-catalog"));
    assert!(catalog.find_by_tmdb_id("1").await.is_err());
}
