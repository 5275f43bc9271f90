//! Tests for document loading and command wiring

#[cfg(test)]
mod input_tests {
    use crate::input::{group_id_from_path, load_documents, split_paragraphs};
    use std::io::Write;
    use std::path::Path;
    use tempfile::NamedTempFile;

    #[test]
    fn test_split_paragraphs() {
        let text = "first line\nstill first  \n\n\n  \nsecond\n\nthird\n";
        assert_eq!(
            split_paragraphs(text),
            vec!["first line\nstill first", "second", "third"]
        );
    }

    #[test]
    fn test_split_paragraphs_empty() {
        assert!(split_paragraphs("\n \n").is_empty());
    }

    #[test]
    fn test_group_id_from_path() {
        assert_eq!(
            group_id_from_path(Path::new("notes/Q3 report.md")).as_deref(),
            Some("q3-report")
        );
        assert_eq!(
            group_id_from_path(Path::new("doc_42.txt")).as_deref(),
            Some("doc-42")
        );
        assert_eq!(group_id_from_path(Path::new("---.txt")), None);
    }

    #[test]
    fn test_load_json_documents() {
        let mut file = NamedTempFile::with_suffix(".json").unwrap();
        write!(
            file,
            r#"[{{"content": "alpha", "metadata": {{"page": 1}}}}, {{"content": "beta"}}]"#
        )
        .unwrap();

        let documents = load_documents(file.path()).unwrap();

        assert_eq!(documents.len(), 2);
        assert_eq!(documents[0].metadata["page"], 1);
        assert!(documents[1].metadata.is_empty());
    }

    #[test]
    fn test_load_text_documents() {
        let mut file = NamedTempFile::with_suffix(".txt").unwrap();
        write!(file, "alpha\n\nbeta\n").unwrap();

        let documents = load_documents(file.path()).unwrap();

        assert_eq!(documents.len(), 2);
        assert_eq!(documents[1].content, "beta");
        assert_eq!(
            documents[1].metadata["source"],
            file.path().display().to_string()
        );
    }

    #[test]
    fn test_load_invalid_json_fails() {
        let mut file = NamedTempFile::with_suffix(".json").unwrap();
        write!(file, "{{\"content\": \"not an array\"}}").unwrap();
        assert!(load_documents(file.path()).is_err());
    }
}

#[cfg(test)]
mod command_tests {
    use std::sync::Arc;

    use docindex_elastic::{ElasticConfig, ElasticsearchBackend};
    use docindex_engine::{EngineConfig, IdentityIndex};

    use crate::document_index;

    #[tokio::test]
    async fn test_maintenance_commands_need_no_embeddings_key() {
        // SAFETY: no other test in this binary reads these variables
        unsafe {
            for var in ["EMBEDDINGS_API_KEY", "RAG_OPENAI_API_KEY", "OPENAI_API_KEY"] {
                std::env::remove_var(var);
            }
        }
        // port 9 (discard) is closed on test machines
        let backend = Arc::new(
            ElasticsearchBackend::new(ElasticConfig::new("http://127.0.0.1:9", "docs")).unwrap(),
        );

        let Err(err) = document_index(backend.clone(), EngineConfig::default()) else {
            panic!("search and ingest need an embeddings key");
        };
        assert!(err.to_string().contains("EMBEDDINGS_API_KEY"), "{err}");

        // delete reaches the cluster instead of failing on configuration
        let err = IdentityIndex::new(backend).delete_group("doc1").await.unwrap_err();
        assert!(err.is_backend_unavailable(), "{err}");
    }
}
