use core::cell::RefCell;
use dom::{MutationObserveOptions, MutationObserver, MutationRecord, Window};
use std::rc::Rc;

fn setup() -> (Window, Rc<RefCell<Vec<Vec<MutationRecord>>>>, MutationObserver) {
    let _ = env_logger::builder().is_test(true).try_init();
    let window = Window::from_url("https://app.example/").unwrap();
    let batches = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&batches);
    let observer = MutationObserver::new(&window, move |records, _| sink.borrow_mut().push(records));
    (window, batches, observer)
}

#[test]
fn records_are_batched_until_the_checkpoint() {
    let (window, batches, observer) = setup();
    let doc = window.document();
    observer.observe(
        doc.document_element().unwrap(),
        MutationObserveOptions::default().merge_over_defaults(),
    );
    let head = doc.head().unwrap();
    let style = doc.create_element("style");
    doc.append_child(head, style).unwrap();
    doc.set_text_content(style, ":root { --a: 1 }").unwrap();
    assert!(batches.borrow().is_empty());

    assert_eq!(window.perform_microtask_checkpoint(), 1);
    let batches = batches.borrow();
    assert_eq!(batches.len(), 1);
    let MutationRecord::ChildList { target, added, .. } = &batches[0][0] else {
        panic!("expected a child list record, got {:?}", batches[0]);
    };
    assert_eq!(*target, head);
    assert_eq!(added[0].tag.as_deref(), Some("style"));
    assert_eq!(batches[0].len(), 2);
}

#[test]
fn removed_nodes_keep_their_tag() {
    let (window, batches, observer) = setup();
    let doc = window.document();
    let link = doc.create_element("LINK");
    doc.append_child(doc.head().unwrap(), link).unwrap();
    observer.observe(
        doc.document_element().unwrap(),
        MutationObserveOptions::default().merge_over_defaults(),
    );
    doc.remove(link).unwrap();
    window.perform_microtask_checkpoint();
    let batches = batches.borrow();
    assert!(matches!(
        &batches[0][0],
        MutationRecord::ChildList { removed, .. } if removed[0].tag.as_deref() == Some("link")
    ));
}

#[test]
fn attributes_are_ignored_by_default_and_subtree_can_be_disabled() {
    let (window, batches, observer) = setup();
    let doc = window.document();
    let html = doc.document_element().unwrap();
    let options: MutationObserveOptions = serde_json::from_str(r#"{"subtree": false}"#).unwrap();
    observer.observe(html, options.merge_over_defaults());

    doc.set_attribute(html, "data-x", "1").unwrap();
    doc.append_child(doc.body().unwrap(), doc.create_element("style")).unwrap();
    assert_eq!(window.perform_microtask_checkpoint(), 0);

    doc.append_child(html, doc.create_element("style")).unwrap();
    assert_eq!(window.perform_microtask_checkpoint(), 1);
    assert_eq!(batches.borrow().len(), 1);
}

#[test]
fn disconnect_drops_pending_records() {
    let (window, batches, observer) = setup();
    let doc = window.document();
    observer.observe(
        doc.document_element().unwrap(),
        MutationObserveOptions::default().merge_over_defaults(),
    );
    doc.append_child(doc.head().unwrap(), doc.create_element("style")).unwrap();
    observer.disconnect();
    doc.append_child(doc.head().unwrap(), doc.create_element("style")).unwrap();
    assert_eq!(window.perform_microtask_checkpoint(), 0);
    assert!(batches.borrow().is_empty());
}

#[test]
fn text_changes_are_character_data() {
    let (window, batches, observer) = setup();
    let doc = window.document();
    let text = doc.create_text_node("a");
    doc.append_child(doc.body().unwrap(), text).unwrap();
    observer.observe(
        doc.document_element().unwrap(),
        MutationObserveOptions::default().merge_over_defaults(),
    );
    doc.set_text_content(text, "b").unwrap();
    window.perform_microtask_checkpoint();
    assert_eq!(batches.borrow()[0], vec![MutationRecord::CharacterData { target: text }]);
    assert_eq!(doc.text_content(doc.body().unwrap()), "b");
}
