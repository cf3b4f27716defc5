use page_harness::{Page, Result};
use proptest::collection::vec;
use proptest::prelude::*;

fn tag_strategy() -> BoxedStrategy<&'static str> {
    prop_oneof![
        Just("div"),
        Just("p"),
        Just("span"),
        Just("section"),
        Just("li"),
        Just("article"),
    ]
    .boxed()
}

fn text_strategy() -> BoxedStrategy<String> {
    proptest::string::string_regex("[a-zA-Z0-9 .:!學生記錄班級]{0,16}")
        .expect("valid regex")
        .boxed()
}

fn attr_value_strategy() -> BoxedStrategy<String> {
    proptest::string::string_regex("[a-zA-Z0-9_-]{1,12}")
        .expect("valid regex")
        .boxed()
}

proptest! {
    #[test]
    fn sibling_elements_keep_ids_text_and_attrs(
        items in vec((tag_strategy(), text_strategy(), attr_value_strategy()), 1..8)
    ) {
        let mut html = String::new();
        for (i, (tag, text, data)) in items.iter().enumerate() {
            html.push_str(&format!(
                "<{tag} id='n{i}' class='k{i}' data-mark='{data}'>{text}</{tag}>"
            ));
        }

        let page = Page::from_html(&html).expect("generated markup parses");

        for (i, (tag, text, data)) in items.iter().enumerate() {
            let node = page.find(&format!("#n{i}")).expect("id resolvable");
            prop_assert_eq!(page.text_content(node), text.clone());
            prop_assert_eq!(page.attr(node, "data-mark"), Some(data.clone()));
            let by_class = page.query_all(&format!("{tag}.k{i}")).expect("class query");
            prop_assert_eq!(by_class, vec![node]);
        }

        let all = page
            .query_all("div, p, span, section, li, article")
            .expect("group query");
        prop_assert_eq!(all.len(), items.len());
    }

    #[test]
    fn nested_chain_resolves_descendant_selectors(
        tags in vec(tag_strategy(), 1..8),
        text in text_strategy(),
    ) {
        let mut html = String::new();
        for (i, tag) in tags.iter().enumerate() {
            html.push_str(&format!("<{tag} id='n{i}'>"));
        }
        html.push_str(&text);
        for tag in tags.iter().rev() {
            html.push_str(&format!("</{tag}>"));
        }

        let page = Page::from_html(&html).expect("generated markup parses");
        let outer = page.find("#n0").expect("outermost id");
        prop_assert_eq!(page.text_content(outer), text.clone());

        if tags.len() > 1 {
            let last = tags.len() - 1;
            let inner = page
                .find(&format!("#n0 #n{last}"))
                .expect("descendant selector");
            prop_assert_eq!(page.text_content(inner), text.clone());
        }
    }

    #[test]
    fn arbitrary_input_never_panics(junk in "[a-zA-Z0-9<>/='\" -]{0,64}") {
        // Malformed markup may error, but must do so through Result.
        let _: Result<Page> = Page::from_html(&junk);
    }
}
