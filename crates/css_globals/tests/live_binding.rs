use core::cell::RefCell;
use core::time::Duration;
use css_globals::{
    CssGlobalProperties, Error, LogLevel, Logger, Options, PropertyKey, STYLES_UPDATED, Scheduling,
    WritePath, is_instance_live,
};
use dom::{Document, NodeKey, Window};
use serde_json::{Value, json};
use std::rc::{Rc, Weak};

fn window() -> Window {
    let _ = env_logger::builder().is_test(true).try_init();
    Window::from_url("https://app.example/").unwrap()
}

fn add_style(doc: &Document, css: &str) -> NodeKey {
    let style = doc.create_element("style");
    doc.set_text_content(style, css).unwrap();
    doc.append_child(doc.head().unwrap(), style).unwrap();
    style
}

fn root(doc: &Document) -> NodeKey {
    doc.document_element().unwrap()
}

#[derive(Clone, Default)]
struct RecordingLogger(Rc<RefCell<Vec<(LogLevel, String)>>>);

impl Logger for RecordingLogger {
    fn log(&self, level: LogLevel, message: &str) {
        self.0.borrow_mut().push((level, message.to_owned()));
    }
}

#[test]
fn initial_scan_reads_trimmed_root_variables() {
    let window = window();
    add_style(&window.document(), ":root { --primary-color: #fff; --size: 10px; }");
    let vars = CssGlobalProperties::with_window(&window, Options::new()).unwrap();
    assert_eq!(vars.get("--primary-color").unwrap().as_deref(), Some("#fff"));
    assert_eq!(vars.get("size").unwrap().as_deref(), Some("10px"));
    assert_eq!(vars.own_keys().unwrap(), vec!["--primary-color", "--size"]);
}

#[test]
fn set_is_visible_to_get_and_lands_on_the_root_inline_style() {
    let window = window();
    let doc = window.document();
    let vars = CssGlobalProperties::with_window(&window, Options::new()).unwrap();
    assert!(vars.set("accent", "#0af").unwrap());
    assert_eq!(vars.get("--accent").unwrap().as_deref(), Some("#0af"));
    assert_eq!(doc.style_get_property_value(root(&doc), "--accent"), "#0af");

    assert!(vars.set("--columns", 12).unwrap());
    assert_eq!(vars.get("columns").unwrap().as_deref(), Some("12"));
    assert!(vars.refresh().unwrap());
    assert_eq!(vars.get("columns").unwrap().as_deref(), Some("12"));
}

#[test]
fn autoprefix_off_rejects_bare_names() {
    let window = window();
    let vars = CssGlobalProperties::with_window(&window, Options::new().autoprefix(false)).unwrap();
    assert!(matches!(
        vars.get("accent"),
        Err(Error::InvalidName { name }) if name == "accent"
    ));
    assert!(matches!(vars.set("accent", "red"), Err(Error::InvalidName { .. })));
    assert!(vars.set("--accent", "red").unwrap());
    assert!(vars.has("--accent").unwrap());
    assert!(matches!(
        vars.define_property("bare", None),
        Err(Error::InvalidName { name }) if name == "bare"
    ));
}

#[test]
fn keys_go_through_the_user_transform() {
    let window = window();
    add_style(&window.document(), ":root { --primary-color: teal }");
    let options = Options::new().normalize(|name: &str| {
        name.chars()
            .flat_map(|ch| {
                let lower = ch.to_ascii_lowercase();
                if ch.is_ascii_uppercase() { vec!['-', lower] } else { vec![lower] }
            })
            .collect()
    });
    let vars = CssGlobalProperties::with_window(&window, options).unwrap();
    assert_eq!(vars.get("primaryColor").unwrap().as_deref(), Some("teal"));
    assert_eq!(
        vars.get(PropertyKey::Symbol(Some("primaryColor"))).unwrap().as_deref(),
        Some("teal")
    );
}

#[test]
fn refresh_twice_gives_the_same_snapshot() {
    let window = window();
    let doc = window.document();
    add_style(&doc, ":root { --a: 1; --b: var(--a) }");
    add_style(&doc, ":root { --c: 3 } body { --d: 4 }");
    let vars = CssGlobalProperties::with_window(&window, Options::new()).unwrap();
    assert!(vars.refresh().unwrap());
    let first = vars.entries().unwrap();
    assert!(vars.refresh().unwrap());
    assert_eq!(vars.entries().unwrap(), first);
    assert_eq!(first.get("--b").map(String::as_str), Some("1"));
    assert!(!first.contains_key("--d"));
}

#[test]
fn scanned_sheets_are_not_extracted_again() {
    let window = window();
    let doc = window.document();
    let style = add_style(&doc, ":root { --a: 1 }");
    let vars = CssGlobalProperties::with_window(&window, Options::new()).unwrap();
    doc.set_text_content(style, ":root { --a: 2; --b: 3 }").unwrap();
    assert!(vars.refresh().unwrap());
    assert_eq!(vars.get("a").unwrap().as_deref(), Some("2"));
    assert!(!vars.has("b").unwrap());
}

#[test]
fn other_selectors_contribute_nothing() {
    let window = window();
    add_style(&window.document(), "body { --x: 1 } html { --y: 2 }");
    let vars = CssGlobalProperties::with_window(&window, Options::new()).unwrap();
    assert!(!vars.has("x").unwrap());
    assert!(!vars.has("y").unwrap());
    assert!(vars.own_keys().unwrap().is_empty());
}

#[test]
fn custom_selector_targets_its_element() {
    let window = window();
    let doc = window.document();
    let panel = doc.create_element("div");
    doc.set_attribute(panel, "class", "panel").unwrap();
    doc.append_child(doc.body().unwrap(), panel).unwrap();
    add_style(&doc, ".panel { --pad: 3px } :root { --pad: 1px }");
    let vars = CssGlobalProperties::with_window(&window, Options::new().selector(".panel")).unwrap();
    assert_eq!(vars.get("pad").unwrap().as_deref(), Some("3px"));
    vars.set("pad", "5px").unwrap();
    assert_eq!(doc.style_get_property_value(panel, "--pad"), "5px");
}

#[test]
fn delete_is_refused_and_define_property_reports_false() {
    let window = window();
    add_style(&window.document(), ":root { --keep: 1 }");
    let vars = CssGlobalProperties::with_window(&window, Options::new()).unwrap();
    assert!(!vars.has("unknown").unwrap());
    assert!(!vars.delete("keep").unwrap());
    assert!(vars.has("keep").unwrap());

    assert!(!vars.define_property("added", Some("2")).unwrap());
    assert_eq!(vars.get("added").unwrap().as_deref(), Some("2"));
    assert!(!vars.define_property("absent", None).unwrap());
    assert!(!vars.has("absent").unwrap());

    let descriptor = vars.get_own_property_descriptor("--added").unwrap().unwrap();
    assert_eq!(descriptor.value, "2");
    assert!(descriptor.writable && descriptor.enumerable && descriptor.configurable);
    assert!(vars.get_own_property_descriptor("added").unwrap().is_none());
}

#[test]
fn appended_style_triggers_styles_updated_within_one_frame() {
    let window = window();
    let doc = window.document();
    let vars = Rc::new(CssGlobalProperties::with_window(&window, Options::new()).unwrap());
    let payloads: Rc<RefCell<Vec<(Value, Option<String>)>>> = Rc::default();
    let (sink, reader) = (Rc::clone(&payloads), Rc::clone(&vars));
    window.add_event_listener(STYLES_UPDATED, move |event| {
        let seen = reader.get("fresh").unwrap();
        sink.borrow_mut().push((event.detail.clone(), seen));
    });

    add_style(&doc, ":root { --fresh: 42px }");
    add_style(&doc, ":root { --other: 1 }");
    assert_eq!(window.run_animation_frame(), 1);

    let payloads = payloads.borrow();
    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0].0, json!({ "--fresh": "42px", "--other": "1" }));
    assert_eq!(payloads[0].1.as_deref(), Some("42px"));
}

#[test]
fn unrelated_mutations_do_not_notify() {
    let window = window();
    let doc = window.document();
    let _vars = CssGlobalProperties::with_window(&window, Options::new()).unwrap();
    let hits = Rc::new(RefCell::new(0));
    let counter = Rc::clone(&hits);
    window.add_event_listener(STYLES_UPDATED, move |_| *counter.borrow_mut() += 1);
    let div = doc.create_element("div");
    doc.append_child(doc.body().unwrap(), div).unwrap();
    doc.set_attribute(div, "class", "x").unwrap();
    window.run_animation_frame();
    assert_eq!(*hits.borrow(), 0);
}

#[test]
fn debounce_waits_for_quiet() {
    let window = window();
    let doc = window.document();
    let options = Options::new().scheduling(Scheduling::Debounce(Duration::from_millis(100)));
    let vars = CssGlobalProperties::with_window(&window, options).unwrap();
    add_style(&doc, ":root { --late: yes }");
    window.run_animation_frame();
    assert!(!vars.has("late").unwrap());
    window.advance_time(Duration::from_millis(100));
    assert_eq!(vars.get("late").unwrap().as_deref(), Some("yes"));
}

#[test]
fn stop_revokes_every_operation() {
    let window = window();
    let doc = window.document();
    let vars = CssGlobalProperties::with_window(&window, Options::new()).unwrap();
    let id = vars.instance_id();
    assert!(is_instance_live(id));
    vars.stop();
    assert!(vars.is_stopped());
    assert!(!is_instance_live(id));
    assert!(matches!(vars.get("a"), Err(Error::Revoked)));
    assert!(matches!(vars.set("a", "1"), Err(Error::Revoked)));
    assert!(matches!(vars.has("a"), Err(Error::Revoked)));
    assert!(matches!(vars.delete("a"), Err(Error::Revoked)));
    assert!(matches!(vars.own_keys(), Err(Error::Revoked)));
    assert!(matches!(vars.define_property("a", None), Err(Error::Revoked)));
    assert!(matches!(vars.refresh(), Err(Error::Revoked)));
    vars.stop();

    let hits = Rc::new(RefCell::new(0));
    let counter = Rc::clone(&hits);
    window.add_event_listener(STYLES_UPDATED, move |_| *counter.borrow_mut() += 1);
    add_style(&doc, ":root { --a: 1 }");
    window.run_animation_frame();
    assert_eq!(*hits.borrow(), 0);
}

#[test]
fn dropping_releases_the_instance() {
    let window = window();
    let vars = CssGlobalProperties::with_window(&window, Options::new()).unwrap();
    let id = vars.instance_id();
    drop(vars);
    assert!(!is_instance_live(id));
}

#[test]
fn filter_aborts_at_the_first_sheet_outside_it() {
    let window = window();
    let doc = window.document();
    let vars_sheet = add_style(&doc, ":root { --a: 1 }");
    doc.set_attribute(vars_sheet, "class", "vars").unwrap();
    add_style(&doc, ":root { --b: 2 }");
    let vars =
        CssGlobalProperties::with_window(&window, Options::new().filter("style.vars")).unwrap();
    assert!(!vars.refresh().unwrap());
    assert_eq!(vars.own_keys().unwrap(), vec!["--a"]);
}

#[test]
fn filter_abort_depends_on_sheet_order() {
    let window = window();
    let doc = window.document();
    add_style(&doc, ":root { --b: 2 }");
    let late = add_style(&doc, ":root { --a: 1 }");
    doc.set_attribute(late, "class", "vars").unwrap();
    let vars =
        CssGlobalProperties::with_window(&window, Options::new().filter("style.vars")).unwrap();
    assert!(!vars.refresh().unwrap());
    assert!(vars.own_keys().unwrap().is_empty());
}

#[test]
fn invalid_filter_fails_construction() {
    let window = window();
    let result = CssGlobalProperties::with_window(&window, Options::new().filter("[x"));
    assert!(matches!(
        result,
        Err(Error::Configuration(message)) if message.contains("invalid selector")
    ));
}

#[test]
fn cross_origin_sheets_are_marked_and_reported_once() {
    let window = window();
    let doc = window.document();
    doc.provide_stylesheet("https://cdn.example/theme.css", ":root { --remote: 1 }")
        .unwrap();
    let link = doc.create_element("link");
    doc.set_attribute(link, "rel", "stylesheet").unwrap();
    doc.set_attribute(link, "href", "https://cdn.example/theme.css").unwrap();
    doc.append_child(doc.head().unwrap(), link).unwrap();
    add_style(&doc, ":root { --local: 2 }");

    let logger = RecordingLogger::default();
    let vars = CssGlobalProperties::with_window(
        &window,
        Options::new().silent(false).logger(logger.clone()),
    )
    .unwrap();
    assert_eq!(
        doc.get_attribute(link, "data-css-global-vars-ignore").as_deref(),
        Some("true")
    );
    assert!(!vars.has("remote").unwrap());
    assert_eq!(vars.get("local").unwrap().as_deref(), Some("2"));
    vars.refresh().unwrap();

    let messages = logger.0.borrow();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].0, LogLevel::Warn);
    assert!(messages[0].1.contains("Cross Origin Policy"));
}

#[test]
fn silent_instances_log_nothing() {
    let window = window();
    let doc = window.document();
    doc.mark_stylesheet_pending("/slow.css").unwrap();
    let link = doc.create_element("link");
    doc.set_attribute(link, "rel", "stylesheet").unwrap();
    doc.set_attribute(link, "href", "/slow.css").unwrap();
    doc.append_child(doc.head().unwrap(), link).unwrap();

    let logger = RecordingLogger::default();
    let _vars =
        CssGlobalProperties::with_window(&window, Options::new().logger(logger.clone())).unwrap();
    assert!(doc.has_attribute(link, "data-css-global-vars-ignore"));
    assert!(logger.0.borrow().is_empty());
}

#[test]
fn instances_share_sheets_through_their_own_markers() {
    let window = window();
    let doc = window.document();
    let style = add_style(&doc, ":root { --shared: 1 }");
    let first = CssGlobalProperties::with_window(&window, Options::new()).unwrap();
    let second = CssGlobalProperties::with_window(&window, Options::new()).unwrap();
    assert_ne!(first.instance_id(), second.instance_id());
    assert_eq!(first.get("shared").unwrap().as_deref(), Some("1"));
    assert_eq!(second.get("shared").unwrap().as_deref(), Some("1"));
    assert_eq!(
        doc.get_attribute(style, "data-css-global-vars-id"),
        Some(format!("{},{}", first.instance_id(), second.instance_id()))
    );
}

#[test]
fn managed_sheet_writes_override_author_rules() {
    let window = window();
    let doc = window.document();
    add_style(&doc, ":root { --tone: light }");
    let vars = CssGlobalProperties::with_window(
        &window,
        Options::new().write_path(WritePath::ManagedSheet),
    )
    .unwrap();
    assert_eq!(vars.get("tone").unwrap().as_deref(), Some("light"));

    vars.set("tone", "dark").unwrap();
    assert_eq!(vars.get("tone").unwrap().as_deref(), Some("dark"));
    assert_eq!(doc.computed_style(root(&doc)).property_value("--tone"), "dark");
    assert_eq!(doc.style_get_property_value(root(&doc), "--tone"), "");
    add_style(&doc, ":root { --tone: loud }");
    window.run_animation_frame();
    assert_eq!(vars.get("tone").unwrap().as_deref(), Some("dark"));

    vars.stop();
    assert_eq!(doc.computed_style(root(&doc)).property_value("--tone"), "loud");
}

#[test]
fn managed_sheet_follows_a_class_selector() {
    let window = window();
    let doc = window.document();
    let panel = doc.create_element("div");
    doc.set_attribute(panel, "class", "panel").unwrap();
    doc.append_child(doc.body().unwrap(), panel).unwrap();
    add_style(&doc, ".panel { --pad: 3px }");
    let options = Options::new()
        .selector(".panel")
        .write_path(WritePath::ManagedSheet);
    let vars = CssGlobalProperties::with_window(&window, options).unwrap();
    assert_eq!(vars.get("pad").unwrap().as_deref(), Some("3px"));

    vars.set("pad", "9px").unwrap();
    assert_eq!(vars.get("pad").unwrap().as_deref(), Some("9px"));
    assert!(vars.refresh().unwrap());
    assert_eq!(vars.get("pad").unwrap().as_deref(), Some("9px"));
    assert_eq!(doc.computed_style(panel).property_value("--pad"), "9px");
    assert_eq!(doc.style_get_property_value(panel, "--pad"), "");
}

/// Reads the binding from inside its own log calls.
#[derive(Clone, Default)]
struct ReadingLogger {
    binding: Rc<RefCell<Weak<CssGlobalProperties>>>,
    seen: Rc<RefCell<Vec<usize>>>,
}

impl Logger for ReadingLogger {
    fn log(&self, _level: LogLevel, _message: &str) {
        let Some(vars) = self.binding.borrow().upgrade() else {
            return;
        };
        let count = vars.entries().unwrap().len();
        self.seen.borrow_mut().push(count);
    }
}

#[test]
fn logger_can_read_the_binding_during_an_update() {
    let window = window();
    let doc = window.document();
    add_style(&doc, ":root { --local: 2 }");
    let logger = ReadingLogger::default();
    let vars = Rc::new(
        CssGlobalProperties::with_window(&window, Options::new().silent(false).logger(logger.clone()))
            .unwrap(),
    );
    *logger.binding.borrow_mut() = Rc::downgrade(&vars);

    doc.provide_stylesheet("https://cdn.example/theme.css", ":root { --remote: 1 }")
        .unwrap();
    let link = doc.create_element("link");
    doc.set_attribute(link, "rel", "stylesheet").unwrap();
    doc.set_attribute(link, "href", "https://cdn.example/theme.css").unwrap();
    doc.append_child(doc.head().unwrap(), link).unwrap();
    assert_eq!(window.run_animation_frame(), 1);

    assert_eq!(*logger.seen.borrow(), vec![1]);
    assert!(!vars.has("remote").unwrap());
    assert_eq!(vars.get("local").unwrap().as_deref(), Some("2"));
}

#[test]
fn transform_can_read_the_binding() {
    let window = window();
    add_style(&window.document(), ":root { --a: 1 }");
    let slot: Rc<RefCell<Weak<CssGlobalProperties>>> = Rc::default();
    let reader = Rc::clone(&slot);
    let options = Options::new().normalize(move |name: &str| {
        if let Some(vars) = reader.borrow().upgrade() {
            assert!(vars.entries().unwrap().contains_key("--a"));
        }
        name.to_owned()
    });
    let vars = Rc::new(CssGlobalProperties::with_window(&window, options).unwrap());
    *slot.borrow_mut() = Rc::downgrade(&vars);
    assert_eq!(vars.get("a").unwrap().as_deref(), Some("1"));
    assert!(vars.set("b", "2").unwrap());
}

#[test]
fn json_options_drive_construction() {
    let window = window();
    add_style(&window.document(), ":root { --a: 1 }");
    let options = Options::from_json(&json!({ "autoprefix": false, "silent": true })).unwrap();
    let vars = CssGlobalProperties::with_window(&window, options).unwrap();
    assert_eq!(vars.get("--a").unwrap().as_deref(), Some("1"));
    assert!(matches!(vars.get("a"), Err(Error::InvalidName { .. })));

    assert!(matches!(
        Options::from_json(&json!({ "filter": false })),
        Err(Error::Configuration(_))
    ));
}

#[test]
fn new_requires_an_installed_window() {
    Window::uninstall();
    assert!(matches!(
        CssGlobalProperties::new(Options::new()),
        Err(Error::Environment)
    ));
    let window = window();
    window.install();
    let vars = CssGlobalProperties::new(Options::new()).unwrap();
    assert!(!vars.is_stopped());
    Window::uninstall();
}
