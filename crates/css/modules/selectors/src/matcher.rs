//! CSS selector matching engine (right-to-left).

use crate::{
    Combinator, ComplexSelector, CompoundSelector, ElementAdapter, PseudoClass, SelectorList,
    SimpleSelector,
};

/// Match a selector list against an element.
pub fn matches_selector_list<A: ElementAdapter>(
    adapter: &A,
    element: A::Handle,
    list: &SelectorList,
) -> bool {
    list.selectors
        .iter()
        .any(|selector_item| matches_complex(adapter, element, selector_item))
}

/// Match a complex selector against an element.
///
/// Compounds are checked from the rightmost one outwards. Each combinator step
/// commits to the nearest candidate, which is exact for the child and adjacent
/// combinators and an approximation for chains of descendant/sibling steps.
pub fn matches_complex<A: ElementAdapter>(
    adapter: &A,
    element: A::Handle,
    sel: &ComplexSelector,
) -> bool {
    let Some((_, rightmost)) = sel.rest.last() else {
        return matches_compound(adapter, element, &sel.first);
    };
    if !matches_compound(adapter, element, rightmost) {
        return false;
    }

    // Pair each combinator with the compound on its left-hand side.
    let mut target = element;
    for index in (0..sel.rest.len()).rev() {
        let Some((combinator, _)) = sel.rest.get(index) else {
            return false;
        };
        let left = match index.checked_sub(1) {
            Some(prev) => match sel.rest.get(prev) {
                Some((_, compound)) => compound,
                None => return false,
            },
            None => &sel.first,
        };
        match find_related(adapter, *combinator, left, target) {
            Some(next_target) => target = next_target,
            None => return false,
        }
    }
    true
}

/// Match a compound selector against a single element.
pub fn matches_compound<A: ElementAdapter>(
    adapter: &A,
    element: A::Handle,
    compound: &CompoundSelector,
) -> bool {
    compound
        .simples
        .iter()
        .all(|simple| matches_simple(adapter, element, simple))
}

fn matches_simple<A: ElementAdapter>(
    adapter: &A,
    element: A::Handle,
    simple: &SimpleSelector,
) -> bool {
    match simple {
        SimpleSelector::Universal => true,
        SimpleSelector::Type(type_name) => adapter.tag_name(element) == type_name.as_str(),
        SimpleSelector::Class(class_name) => adapter.has_class(element, class_name),
        SimpleSelector::IdSelector(id_value) => adapter
            .element_id(element)
            .is_some_and(|value| value == id_value.as_str()),
        SimpleSelector::Attribute { name, value } => {
            match (adapter.attr(element, name), value) {
                (None, _) => false,
                (Some(_), None) => true,
                (Some(found), Some(expected)) => found == expected.as_str(),
            }
        }
        SimpleSelector::Pseudo(PseudoClass::Root) => adapter.is_root(element),
        SimpleSelector::Pseudo(PseudoClass::FirstChild) => {
            adapter.parent(element).is_some() && adapter.previous_sibling_element(element).is_none()
        }
        SimpleSelector::Pseudo(PseudoClass::LastChild) => {
            adapter.parent(element).is_some() && adapter.next_sibling_element(element).is_none()
        }
    }
}

/// Find the element related to `right_element` through `comb` that matches `left_comp`.
fn find_related<A: ElementAdapter>(
    adapter: &A,
    comb: Combinator,
    left_comp: &CompoundSelector,
    right_element: A::Handle,
) -> Option<A::Handle> {
    match comb {
        Combinator::Descendant => {
            let mut current_parent = adapter.parent(right_element);
            while let Some(ancestor_element) = current_parent {
                if matches_compound(adapter, ancestor_element, left_comp) {
                    return Some(ancestor_element);
                }
                current_parent = adapter.parent(ancestor_element);
            }
            None
        }
        Combinator::Child => adapter
            .parent(right_element)
            .filter(|parent_el| matches_compound(adapter, *parent_el, left_comp)),
        Combinator::AdjacentSibling => adapter
            .previous_sibling_element(right_element)
            .filter(|prev_el| matches_compound(adapter, *prev_el, left_comp)),
        Combinator::GeneralSibling => {
            let mut current_sibling = adapter.previous_sibling_element(right_element);
            while let Some(sibling_element) = current_sibling {
                if matches_compound(adapter, sibling_element, left_comp) {
                    return Some(sibling_element);
                }
                current_sibling = adapter.previous_sibling_element(sibling_element);
            }
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_selector_list;

    /// html > (head > style#a.theme, body > div)
    struct Tree;

    const HTML: usize = 0;
    const HEAD: usize = 1;
    const STYLE: usize = 2;
    const BODY: usize = 3;
    const DIV: usize = 4;

    impl ElementAdapter for Tree {
        type Handle = usize;

        fn parent(&self, element: usize) -> Option<usize> {
            match element {
                HEAD | BODY => Some(HTML),
                STYLE => Some(HEAD),
                DIV => Some(BODY),
                _ => None,
            }
        }
        fn previous_sibling_element(&self, element: usize) -> Option<usize> {
            (element == BODY).then_some(HEAD)
        }
        fn next_sibling_element(&self, element: usize) -> Option<usize> {
            (element == HEAD).then_some(BODY)
        }
        fn is_root(&self, element: usize) -> bool {
            element == HTML
        }
        fn tag_name(&self, element: usize) -> &str {
            ["html", "head", "style", "body", "div"][element]
        }
        fn element_id(&self, element: usize) -> Option<&str> {
            (element == STYLE).then_some("a")
        }
        fn has_class(&self, element: usize, class: &str) -> bool {
            element == STYLE && class == "theme"
        }
        fn attr(&self, element: usize, name: &str) -> Option<&str> {
            (element == STYLE && name == "media").then_some("all")
        }
    }

    fn matches(selector: &str, element: usize) -> bool {
        matches_selector_list(&Tree, element, &parse_selector_list(selector).unwrap())
    }

    #[test]
    fn root_matches_only_document_element() {
        assert!(matches(":root", HTML));
        assert!(!matches(":root", BODY));
        assert!(matches("html:root", HTML));
    }

    #[test]
    fn combinators() {
        assert!(matches("head > style", STYLE));
        assert!(matches("html style#a", STYLE));
        assert!(!matches("body style", STYLE));
        assert!(matches("head + body > div", DIV));
        assert!(matches("head ~ body", BODY));
        assert!(!matches("body > style", STYLE));
    }

    #[test]
    fn attributes_and_classes() {
        assert!(matches("style[media]", STYLE));
        assert!(matches("style[media=all].theme", STYLE));
        assert!(!matches("style[media=print]", STYLE));
        assert!(matches(".nope, #a", STYLE));
    }

    #[test]
    fn structural_pseudo_classes() {
        assert!(matches("head:first-child", HEAD));
        assert!(!matches("body:first-child", BODY));
        assert!(matches("body:last-child", BODY));
        assert!(!matches(":first-child", HTML));
    }
}
