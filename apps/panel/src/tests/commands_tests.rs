use super::*;
use panel_core::ConnectionStatus;
use shared::domain::{
    Anchor, BadgeDefaults, BadgePosition, BadgeSize, CaptureArea, PageKey, ScreenItem,
};

fn dispatched(line: &str) -> Action {
    match parse_command(line).expect("parse").expect("command") {
        PanelCommand::Dispatch(action) => action,
        other => panic!("expected an action, got {other:?}"),
    }
}

#[test]
fn blank_lines_are_skipped() {
    assert_eq!(parse_command("   ").expect("parse"), None);
}

#[test]
fn control_commands_parse() {
    assert_eq!(
        parse_command("status").expect("parse"),
        Some(PanelCommand::Status)
    );
    assert_eq!(parse_command("QUIT").expect("parse"), Some(PanelCommand::Quit));
    assert_eq!(
        parse_command("reconnect").expect("parse"),
        Some(PanelCommand::Reconnect)
    );
}

#[test]
fn badge_attributes_accept_dashed_keywords() {
    assert_eq!(dispatched("size large"), Action::SetBadgeSize(BadgeSize::Large));
    assert_eq!(
        dispatched("position bottom-right"),
        Action::SetBadgePosition(BadgePosition::BottomRight)
    );
    assert_eq!(
        dispatched("area full-page"),
        Action::SetCaptureArea(CaptureArea::FullPage)
    );
    assert_eq!(
        dispatched("color #0ea5e9"),
        Action::SetBadgeColor(BadgeColor("#0ea5e9".into()))
    );
    assert!(parse_command("shape hexagon").is_err());
    assert!(parse_command("size").is_err());
}

#[test]
fn selection_commands_map_to_selection_changes() {
    assert_eq!(
        dispatched("pick 4"),
        Action::ItemSelectionChanged(SelectionChange::Item(ItemId(4)))
    );
    assert_eq!(
        dispatched("toggle Header links"),
        Action::ItemSelectionChanged(SelectionChange::Group(Some("Header links".into())))
    );
    assert_eq!(
        dispatched("toggle -"),
        Action::ItemSelectionChanged(SelectionChange::Group(None))
    );
    assert_eq!(
        dispatched("none"),
        Action::ItemSelectionChanged(SelectionChange::All(false))
    );
    assert!(parse_command("pick four").is_err());
}

#[test]
fn move_and_comment_take_arguments() {
    assert_eq!(
        dispatched("move 3 2 0"),
        Action::ReorderItems {
            from_id: ItemId(3),
            from_index: 2,
            to_index: 0,
        }
    );
    assert!(parse_command("move 3 2").is_err());
    assert_eq!(
        dispatched("comment 5 needs alt text"),
        Action::SetComment {
            id: ItemId(5),
            comment: "needs alt text".into(),
        }
    );
    assert_eq!(
        dispatched("comment 5"),
        Action::SetComment {
            id: ItemId(5),
            comment: String::new(),
        }
    );
    assert_eq!(dispatched("hover none"), Action::HoverItem(None));
    assert_eq!(dispatched("hover 2"), Action::HoverItem(Some(ItemId(2))));
}

#[test]
fn unknown_commands_are_rejected() {
    let err = parse_command("launch").expect_err("unknown");
    assert!(err.to_string().contains("launch"));
}

#[test]
fn describe_lists_groups_with_flags() {
    let mut first = ScreenItem::new(ItemId(1), Anchor::new("#logo"), &BadgeDefaults::default());
    first.label = 1.0;
    let mut second = ScreenItem::new(ItemId(2), Anchor::new("#cta"), &BadgeDefaults::default());
    second.label = 1.0;
    second.group = Some("Hero".into());
    second.comment = Some("too small".into());

    let mut model = Model {
        status: ConnectionStatus::Connected,
        page_key: PageKey::from_url("https://example.com/"),
        items: vec![second, first],
        ..Model::default()
    };
    model.select_items.insert(ItemId(1));
    model.missing_ids.insert(ItemId(2));

    let text = describe(&model);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(
        lines[0],
        "status: connected  page: https://example.com/  picking: off"
    );
    assert_eq!(lines[1], "[ungrouped]");
    assert!(lines[2].ends_with("#1 #logo*"));
    assert_eq!(lines[3], "[Hero]");
    assert!(lines[4].contains("#2 #cta?"));
    assert!(lines[4].ends_with("// too small"));
}
