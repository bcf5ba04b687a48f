use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::engine::RuleEngine;
use crate::pipeline::RewriteRecord;

/// Visible rows in the group list before it scrolls.
pub const VIEWPORT_HEIGHT: usize = 15;

/// The abstract navigation alphabet. Decoding raw keys into these symbols is
/// the terminal front end's concern (see `term`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavInput {
    Up,
    Down,
    Confirm,
    Back,
}

pub trait InputSource {
    /// The next navigation symbol, or `None` when input is exhausted.
    fn next_input(&mut self) -> Option<NavInput>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupMode {
    ByRule,
    ByFile,
}

/// Coarse state identity, recorded as a trail so scripted sessions can
/// assert which states a given input sequence visits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKind {
    TopMenu,
    GroupList,
    RecordReview,
    Terminal,
}

/// Rendering seam. The terminal front end prints menus and diffs; tests plug
/// in a silent screen.
pub trait ReviewScreen {
    fn show_summary(&mut self, found: usize, selected: usize);
    fn show_menu(
        &mut self,
        question: &str,
        items: &[String],
        cursor: usize,
        scroll: usize,
        height: usize,
    );
    fn show_record(&mut self, record: &RewriteRecord, position: usize, total: usize);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    TopMenu {
        cursor: usize,
    },
    GroupList {
        mode: GroupMode,
        cursor: usize,
        scroll: usize,
    },
    RecordReview {
        mode: GroupMode,
        group: usize,
        position: usize,
        cursor: usize,
    },
    Terminal,
}

impl State {
    fn kind(&self) -> StateKind {
        match self {
            State::TopMenu { .. } => StateKind::TopMenu,
            State::GroupList { .. } => StateKind::GroupList,
            State::RecordReview { .. } => StateKind::RecordReview,
            State::Terminal => StateKind::Terminal,
        }
    }
}

struct Group {
    label: String,
    members: Vec<usize>,
}

const TOP_MENU_ITEMS: [&str; 3] = [
    "Review rewrites by rule",
    "Review rewrites by file",
    "Exit without doing anything",
];

const RECORD_ITEMS: [&str; 2] = ["Accept this rewrite", "Reject this rewrite"];

/// Drive the interactive review to its terminal state. Returns the trail of
/// visited states (one entry per state kind change).
pub fn run_review(
    records: &mut [RewriteRecord],
    engine: &dyn RuleEngine,
    input: &mut dyn InputSource,
    screen: &mut dyn ReviewScreen,
) -> Vec<StateKind> {
    let mut state = State::TopMenu { cursor: 0 };
    let mut visited = vec![state.kind()];

    while state != State::Terminal {
        render(&state, records, engine, screen);
        let Some(symbol) = input.next_input() else {
            state = State::Terminal;
            visited.push(StateKind::Terminal);
            break;
        };
        let next = step(state, symbol, records, engine);
        if next.kind() != state.kind() {
            visited.push(next.kind());
        }
        state = next;
    }

    visited
}

fn render(
    state: &State,
    records: &[RewriteRecord],
    engine: &dyn RuleEngine,
    screen: &mut dyn ReviewScreen,
) {
    match *state {
        State::TopMenu { cursor } => {
            let selected = records.iter().filter(|r| r.accepted).count();
            screen.show_summary(records.len(), selected);
            screen.show_menu(
                "What would you like to do?",
                &owned_items(&TOP_MENU_ITEMS),
                cursor,
                0,
                TOP_MENU_ITEMS.len(),
            );
        }
        State::GroupList {
            mode,
            cursor,
            scroll,
        } => {
            let groups = build_groups(records, mode, engine);
            let items: Vec<String> = groups.into_iter().map(|g| g.label).collect();
            let question = match mode {
                GroupMode::ByRule => "Which rule would you like to review?",
                GroupMode::ByFile => "Which file would you like to review?",
            };
            screen.show_menu(question, &items, cursor, scroll, VIEWPORT_HEIGHT);
        }
        State::RecordReview {
            mode,
            group,
            position,
            cursor,
        } => {
            let groups = build_groups(records, mode, engine);
            if let Some(group) = groups.get(group) {
                if let Some(&record) = group.members.get(position) {
                    screen.show_record(&records[record], position + 1, group.members.len());
                }
            }
            screen.show_menu(
                "What would you like to do?",
                &owned_items(&RECORD_ITEMS),
                cursor,
                0,
                RECORD_ITEMS.len(),
            );
        }
        State::Terminal => {}
    }
}

fn step(
    state: State,
    symbol: NavInput,
    records: &mut [RewriteRecord],
    engine: &dyn RuleEngine,
) -> State {
    match state {
        State::TopMenu { cursor } => match symbol {
            NavInput::Up => State::TopMenu {
                cursor: cursor.saturating_sub(1),
            },
            NavInput::Down => State::TopMenu {
                cursor: (cursor + 1).min(TOP_MENU_ITEMS.len() - 1),
            },
            NavInput::Back => state,
            NavInput::Confirm => match cursor {
                0 => State::GroupList {
                    mode: GroupMode::ByRule,
                    cursor: 0,
                    scroll: 0,
                },
                1 => State::GroupList {
                    mode: GroupMode::ByFile,
                    cursor: 0,
                    scroll: 0,
                },
                _ => State::Terminal,
            },
        },
        State::GroupList {
            mode,
            cursor,
            scroll,
        } => {
            let group_count = build_groups(records, mode, engine).len();
            match symbol {
                NavInput::Up => {
                    let cursor = cursor.saturating_sub(1);
                    State::GroupList {
                        mode,
                        cursor,
                        scroll: clamp_scroll(cursor, scroll, VIEWPORT_HEIGHT),
                    }
                }
                NavInput::Down => {
                    let cursor = (cursor + 1).min(group_count.saturating_sub(1));
                    State::GroupList {
                        mode,
                        cursor,
                        scroll: clamp_scroll(cursor, scroll, VIEWPORT_HEIGHT),
                    }
                }
                NavInput::Back => State::TopMenu { cursor: 0 },
                NavInput::Confirm => {
                    if group_count == 0 {
                        State::TopMenu { cursor: 0 }
                    } else {
                        State::RecordReview {
                            mode,
                            group: cursor,
                            position: 0,
                            cursor: 0,
                        }
                    }
                }
            }
        }
        State::RecordReview {
            mode,
            group,
            position,
            cursor,
        } => match symbol {
            NavInput::Up => State::RecordReview {
                mode,
                group,
                position,
                cursor: cursor.saturating_sub(1),
            },
            NavInput::Down => State::RecordReview {
                mode,
                group,
                position,
                cursor: (cursor + 1).min(RECORD_ITEMS.len() - 1),
            },
            NavInput::Back => back_to_group_list(mode, group),
            NavInput::Confirm => {
                let groups = build_groups(records, mode, engine);
                let Some(current) = groups.get(group) else {
                    return back_to_group_list(mode, group);
                };
                if let Some(&record) = current.members.get(position) {
                    records[record].accepted = cursor == 0;
                }
                if position + 1 < current.members.len() {
                    State::RecordReview {
                        mode,
                        group,
                        position: position + 1,
                        cursor: 0,
                    }
                } else {
                    back_to_group_list(mode, group)
                }
            }
        },
        State::Terminal => State::Terminal,
    }
}

fn back_to_group_list(mode: GroupMode, group: usize) -> State {
    State::GroupList {
        mode,
        cursor: group,
        scroll: clamp_scroll(group, 0, VIEWPORT_HEIGHT),
    }
}

/// Keep the cursor inside the visible window.
fn clamp_scroll(cursor: usize, scroll: usize, height: usize) -> usize {
    if cursor < scroll {
        cursor
    } else if cursor >= scroll + height {
        cursor + 1 - height
    } else {
        scroll
    }
}

/// Group record indices by rule id or by filename, with stable (sorted) key
/// order and fresh accepted/total counters in each label.
fn build_groups(records: &[RewriteRecord], mode: GroupMode, engine: &dyn RuleEngine) -> Vec<Group> {
    match mode {
        GroupMode::ByRule => {
            let mut by_rule: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
            for (idx, record) in records.iter().enumerate() {
                by_rule.entry(record.rule_id).or_default().push(idx);
            }
            by_rule
                .into_iter()
                .map(|(rule_id, members)| {
                    let name = match engine.describe(rule_id) {
                        Some(description) => format!("{description} \u{2022} S{rule_id}"),
                        None => format!("S{rule_id}"),
                    };
                    Group {
                        label: labeled(name, records, &members),
                        members,
                    }
                })
                .collect()
        }
        GroupMode::ByFile => {
            let mut by_file: BTreeMap<PathBuf, Vec<usize>> = BTreeMap::new();
            for (idx, record) in records.iter().enumerate() {
                by_file
                    .entry(record.filename.clone())
                    .or_default()
                    .push(idx);
            }
            by_file
                .into_iter()
                .map(|(path, members)| Group {
                    label: labeled(path.display().to_string(), records, &members),
                    members,
                })
                .collect()
        }
    }
}

fn labeled(name: String, records: &[RewriteRecord], members: &[usize]) -> String {
    let accepted = members.iter().filter(|&&idx| records[idx].accepted).count();
    format!("{name} ({accepted}/{})", members.len())
}

fn owned_items(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| (*item).to_string()).collect()
}
