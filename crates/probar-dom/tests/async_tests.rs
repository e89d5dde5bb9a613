//! Async query tests: `find_by*` retries on mutations and gives up at the deadline.

use std::time::Duration;

use probar_dom::prelude::*;
use probar_dom::MutationObserverInit;

fn text_queries(doc: &Document) -> Queries {
    probar_dom::within_with_config(&doc.body(), Config::default())
}

#[tokio::test(start_paused = true)]
async fn test_find_by_resolves_when_child_inserted_in_window() {
    let doc = Document::new();
    let writer = doc.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        let p = writer.create_element("p");
        p.set_text_content("Ready").unwrap();
        writer.body().append_child(&p).unwrap();
    });

    let found = text_queries(&doc).find_by_text("Ready").await.unwrap();
    assert_eq!(found.tag_name().unwrap(), "p");
}

#[tokio::test(start_paused = true)]
async fn test_find_by_times_out_when_inserted_too_late() {
    let doc = Document::new();
    let writer = doc.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        writer.body().set_inner_html("<p>Ready</p>").unwrap();
    });

    let err = text_queries(&doc).find_by_text("Ready").await.unwrap_err();
    match err {
        QueryError::Timeout { ms, message } => {
            assert_eq!(ms, 1_000);
            assert!(message.starts_with("Unable to find an element with the text: Ready."));
            assert!(message.contains("<body />"));
        }
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_find_by_reports_multiple_at_timeout() {
    let doc = Document::parse("<p>Dup</p><p>Dup</p>");
    let q = text_queries(&doc).with_wait_options(WaitOptions::default().with_timeout(100));
    let err = q.find_by_text("Dup").await.unwrap_err();
    assert!(err.is_timeout());
    assert!(err.to_string().starts_with("Found multiple elements with the text: Dup"));
}

#[tokio::test(start_paused = true)]
async fn test_find_all_by_waits_for_attribute_change() {
    let doc = Document::parse("<button>Save</button>");
    let button = doc.body().query_selector("button").unwrap().unwrap();
    let writer = button.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(40)).await;
        writer.set_attribute("data-testid", "save").unwrap();
    });

    let q = text_queries(&doc).with_wait_options(
        WaitOptions::default()
            .with_interval(60_000)
            .with_mutation_observer(MutationObserverInit::default()),
    );
    let found = q.find_all_by_test_id("save").await.unwrap();
    assert_eq!(found, vec![button]);
}

#[tokio::test(start_paused = true)]
async fn test_character_data_change_wakes_text_query() {
    let doc = Document::parse("<p>Loading</p>");
    let text_node = doc.body().query_selector("p").unwrap().unwrap().children()[0].clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        text_node.set_text_content("Done").unwrap();
    });

    let q = text_queries(&doc)
        .with_wait_options(WaitOptions::default().with_interval(60_000));
    assert!(q.find_by_text("Done").await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_dropping_find_future_cancels() {
    let doc = Document::new();
    let q = text_queries(&doc);
    let pending = q.find_by_text("never");
    let raced = tokio::time::timeout(Duration::from_millis(10), pending).await;
    assert!(raced.is_err());
    // Nothing left behind keeps mutating or polling; the document stays usable
    doc.body().set_inner_html("<p>never</p>").unwrap();
    assert!(q.get_by_text("never").is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_element_to_be_removed_through_queries() {
    let doc = Document::parse("<div role=\"alert\">Saving</div>");
    let alert = doc.body().query_selector("div").unwrap().unwrap();
    let remover = alert.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(70)).await;
        remover.remove();
    });

    let q = text_queries(&doc);
    q.wait_for_element_to_be_removed(|| q.get_all_by_role("alert"))
        .await
        .unwrap();
    assert!(q.query_by_role("alert").unwrap().is_none());
}
