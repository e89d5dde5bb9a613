//! Default document tests.
//!
//! The default document is process-wide, so tests here serialize on a
//! file-local lock.

use std::sync::Mutex;

use probar_dom::prelude::*;
use probar_dom::{clear_default_document, default_document};

static SCREEN_LOCK: Mutex<()> = Mutex::new(());

#[test]
fn test_screen_without_document_is_configuration_error() {
    let _lock = SCREEN_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    clear_default_document();
    let err = screen().unwrap_err();
    assert!(matches!(err, QueryError::Configuration { .. }));
    assert!(err.to_string().contains("set_default_document"));
}

#[test]
fn test_screen_queries_default_body() {
    let _lock = SCREEN_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    let doc = Document::parse("<h1>Dashboard</h1>");
    set_default_document(&doc);
    let heading = screen().unwrap().get_by_role("heading").unwrap();
    assert_eq!(heading.text_content(), "Dashboard");
    assert!(default_document().unwrap().ptr_eq(&doc));
    clear_default_document();
}

#[tokio::test(start_paused = true)]
async fn test_screen_find_by_sees_later_insert() {
    let doc = Document::new();
    let page = {
        let _lock = SCREEN_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        set_default_document(&doc);
        let page = screen().unwrap();
        clear_default_document();
        page
    };
    let writer = doc.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        writer.body().set_inner_html("<button>Retry</button>").unwrap();
    });
    assert!(page.find_by_role(RoleQuery::new("button").name("Retry")).await.is_ok());
}
