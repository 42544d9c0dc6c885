//! Mutually exclusive tab panels.

use tracing::debug;

/// Tab buttons (by their `data-tab` target) and content panels (by id), in
/// document order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TabSet {
    buttons: Vec<Option<String>>,
    contents: Vec<String>,
}

/// Visibility after a click, index-aligned with the [`TabSet`].
#[derive(Clone, Debug, PartialEq)]
pub struct TabState {
    pub active_buttons: Vec<bool>,
    pub visible_contents: Vec<bool>,
}

impl TabSet {
    pub fn new(buttons: Vec<Option<String>>, contents: Vec<String>) -> Self {
        Self { buttons, contents }
    }

    /// State after clicking button `index`. A button without a target, or an
    /// index past the end, leaves the page as it is.
    pub fn activate(&self, index: usize) -> Option<TabState> {
        let Some(target) = self.buttons.get(index)?.as_deref().filter(|t| !t.is_empty()) else {
            debug!("tab button {index} has no target");
            return None;
        };
        Some(TabState {
            active_buttons: (0..self.buttons.len()).map(|i| i == index).collect(),
            visible_contents: self.contents.iter().map(|id| id == target).collect(),
        })
    }
}

/// The tab buttons and panels as they are on the page right now.
pub trait TabSurface {
    type Element: PartialEq;

    fn buttons(&self) -> Vec<Self::Element>;
    fn contents(&self) -> Vec<Self::Element>;
    /// The button's `data-tab` value.
    fn target(&self, button: &Self::Element) -> Option<String>;
    fn content_id(&self, content: &Self::Element) -> String;
    fn set_active(&mut self, button: &Self::Element, active: bool);
    fn set_visible(&mut self, content: &Self::Element, visible: bool);
}

/// Apply a click on `clicked`. Buttons and panels are read at click time, so
/// a panel that replaced an earlier one takes part. Returns whether anything
/// changed.
pub fn activate_tab<S: TabSurface>(surface: &mut S, clicked: &S::Element) -> bool {
    let buttons = surface.buttons();
    let contents = surface.contents();
    let Some(index) = buttons.iter().position(|b| b == clicked) else {
        debug!("clicked tab button is no longer on the page");
        return false;
    };
    let set = TabSet::new(
        buttons.iter().map(|b| surface.target(b)).collect(),
        contents.iter().map(|c| surface.content_id(c)).collect(),
    );
    let Some(state) = set.activate(index) else {
        return false;
    };
    for (button, active) in buttons.iter().zip(state.active_buttons) {
        surface.set_active(button, active);
    }
    for (content, visible) in contents.iter().zip(state.visible_contents) {
        surface.set_visible(content, visible);
    }
    true
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn tabs() -> TabSet {
        TabSet::new(
            vec![
                Some("overview".into()),
                Some("dcf-tab".into()),
                None,
                Some("transcripts".into()),
            ],
            vec!["overview".into(), "dcf-tab".into(), "transcripts".into()],
        )
    }

    #[test]
    fn exactly_one_panel_visible() {
        let state = tabs().activate(1).unwrap();
        assert_eq!(state.active_buttons, vec![false, true, false, false]);
        assert_eq!(state.visible_contents, vec![false, true, false]);
    }

    #[test]
    fn button_without_target_is_ignored() {
        assert_eq!(tabs().activate(2), None);
        assert_eq!(tabs().activate(9), None);
    }

    #[test]
    fn unknown_target_hides_everything_but_marks_button() {
        let set = TabSet::new(vec![Some("gone".into())], vec!["overview".into()]);
        let state = set.activate(0).unwrap();
        assert_eq!(state.active_buttons, vec![true]);
        assert_eq!(state.visible_contents, vec![false]);
    }

    /// Nodes are plain numbers; replacing a panel gives it a new number.
    #[derive(Default)]
    struct FakeTabs {
        buttons: Vec<(u32, Option<String>)>,
        contents: Vec<(u32, String)>,
        active: HashMap<u32, bool>,
        visible: HashMap<u32, bool>,
    }

    impl FakeTabs {
        fn replace_content(&mut self, id: &str, node: u32) {
            if let Some(slot) = self.contents.iter_mut().find(|(_, c)| c == id) {
                slot.0 = node;
            }
            self.visible.insert(node, true);
        }

        fn shown(&self) -> Vec<&str> {
            self.contents
                .iter()
                .filter(|(node, _)| self.visible.get(node).copied().unwrap_or(false))
                .map(|(_, id)| id.as_str())
                .collect()
        }
    }

    impl TabSurface for FakeTabs {
        type Element = u32;

        fn buttons(&self) -> Vec<u32> {
            self.buttons.iter().map(|(node, _)| *node).collect()
        }

        fn contents(&self) -> Vec<u32> {
            self.contents.iter().map(|(node, _)| *node).collect()
        }

        fn target(&self, button: &u32) -> Option<String> {
            self.buttons.iter().find(|(node, _)| node == button).and_then(|(_, t)| t.clone())
        }

        fn content_id(&self, content: &u32) -> String {
            self.contents
                .iter()
                .find(|(node, _)| node == content)
                .map(|(_, id)| id.clone())
                .unwrap_or_default()
        }

        fn set_active(&mut self, button: &u32, active: bool) {
            self.active.insert(*button, active);
        }

        fn set_visible(&mut self, content: &u32, visible: bool) {
            self.visible.insert(*content, visible);
        }
    }

    fn page() -> FakeTabs {
        FakeTabs {
            buttons: vec![(1, Some("overview".into())), (2, Some("dcf-tab".into())), (3, None)],
            contents: vec![(10, "overview".into()), (11, "dcf-tab".into())],
            ..FakeTabs::default()
        }
    }

    #[test]
    fn replaced_panel_is_hidden_by_later_clicks() {
        let mut tabs = page();
        assert!(activate_tab(&mut tabs, &2));
        assert_eq!(tabs.shown(), vec!["dcf-tab"]);

        tabs.replace_content("dcf-tab", 12);
        assert!(activate_tab(&mut tabs, &1));
        assert_eq!(tabs.shown(), vec!["overview"]);
        assert_eq!(tabs.visible.get(&12), Some(&false));
        assert_eq!(tabs.active.get(&1), Some(&true));
        assert_eq!(tabs.active.get(&2), Some(&false));
    }

    #[test]
    fn detached_or_untargeted_button_changes_nothing() {
        let mut tabs = page();
        assert!(!activate_tab(&mut tabs, &3));
        assert!(!activate_tab(&mut tabs, &99));
        assert!(tabs.active.is_empty());
        assert!(tabs.visible.is_empty());
    }
}
