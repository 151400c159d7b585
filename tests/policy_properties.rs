// Property tests over the transition policy table

use proptest::prelude::*;
use story_gate::workflow::{guard, policy};
use story_gate::{Role, StoryStatus};

fn any_status() -> impl Strategy<Value = StoryStatus> {
    prop::sample::select(StoryStatus::ALL.to_vec())
}

fn any_role() -> impl Strategy<Value = Role> {
    prop::sample::select(Role::ALL.to_vec())
}

proptest! {
    #[test]
    fn can_transition_matches_the_rule_table(from in any_status(), to in any_status(), role in any_role()) {
        let expected = policy::find_rule(from, to).is_some_and(|rule| rule.allows(role));
        prop_assert_eq!(policy::can_transition(from, to, Some(role)), expected);
        prop_assert_eq!(guard::authorize(from, to, role).is_ok(), expected);
    }

    #[test]
    fn missing_role_never_passes(from in any_status(), to in any_status()) {
        prop_assert!(!policy::can_transition(from, to, None));
        prop_assert!(policy::get_allowed_transitions(from, None).is_empty());
    }

    #[test]
    fn unknown_status_strings_are_inert(raw in "[a-z ]{1,24}", role in any_role()) {
        prop_assume!(raw.parse::<StoryStatus>().is_err());
        let config = policy::get_config_raw(&raw);
        prop_assert!(config.transitions.is_empty());
        prop_assert_eq!(config.label.as_str(), raw.as_str());
        prop_assert!(!policy::can_transition_raw(&raw, "draft", Some(role)));
        prop_assert!(!policy::can_transition_raw("draft", &raw, Some(role)));
    }

    #[test]
    fn notes_rule_is_enforced_for_blank_input(from in any_status(), to in any_status(), blank in "[ \t\n]{0,6}") {
        if let Some(rule) = policy::find_rule(from, to) {
            let result = guard::check_notes(rule, Some(blank.as_str()));
            prop_assert_eq!(result.is_err(), rule.requires_notes);
        }
    }
}

#[test]
fn every_status_has_a_way_out() {
    for status in StoryStatus::ALL {
        assert!(
            !policy::get_config(status).transitions.is_empty(),
            "{status} is a dead end"
        );
    }
}

#[test]
fn only_the_two_senior_roles_reopen_out_of_scope() {
    let reopeners: Vec<Role> = Role::ALL
        .into_iter()
        .filter(|role| policy::can_transition(StoryStatus::OutOfScope, StoryStatus::Draft, Some(*role)))
        .collect();
    assert_eq!(reopeners, vec![Role::Admin, Role::PortfolioManager]);
}

#[test]
fn needs_discussion_reaches_every_resolution() {
    let targets: Vec<StoryStatus> = policy::get_config(StoryStatus::NeedsDiscussion)
        .transitions
        .iter()
        .map(|rule| rule.to)
        .collect();
    for expected in [
        StoryStatus::Draft,
        StoryStatus::InternalReview,
        StoryStatus::PendingClientReview,
        StoryStatus::OutOfScope,
    ] {
        assert!(targets.contains(&expected), "missing {expected}");
    }
}

#[test]
fn only_client_bound_hand_offs_are_regulated() {
    let regulated: Vec<(StoryStatus, StoryStatus)> = policy::all_rules()
        .filter(|rule| rule.requires_approval())
        .map(|rule| (rule.from, rule.to))
        .collect();
    assert_eq!(
        regulated,
        vec![
            (StoryStatus::InternalReview, StoryStatus::PendingClientReview),
            (StoryStatus::PendingClientReview, StoryStatus::Approved),
        ]
    );
}
