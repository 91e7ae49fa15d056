//! Demo lists for `todos init --seed`.

use todos_client::{DispatchError, Dispatcher};
use todos_types::{ListRecord, NewTodo};

/// List name, then each todo as `[text, tags...]`.
const DEMO: &[(&str, &[&[&str]])] = &[
    (
        "Meteor Principles",
        &[
            &["Data on the Wire", "Simplicity", "Better UX", "Fun"],
            &["One Language", "Simplicity", "Fun"],
            &["Database Everywhere", "Simplicity"],
            &["Latency Compensation", "Better UX"],
            &["Full Stack Reactivity", "Better UX", "Fun"],
            &["Embrace the Ecosystem", "Fun"],
            &["Simplicity Equals Productivity", "Simplicity", "Fun"],
        ],
    ),
    (
        "Languages",
        &[
            &["Lisp", "GC"],
            &["C", "Linked"],
            &["C++", "Objects", "Linked"],
            &["Python", "GC", "Objects"],
            &["Ruby", "GC", "Objects"],
            &["JavaScript", "GC", "Objects"],
            &["Scala", "GC", "Objects"],
            &["Erlang", "GC"],
            &["6502 Assembly", "Linked"],
        ],
    ),
    (
        "Favorite Scientists",
        &[
            &["Ada Lovelace", "Computer Science"],
            &["Grace Hopper", "Computer Science"],
            &["Marie Curie", "Physics", "Chemistry"],
            &["Carl Friedrich Gauss", "Math", "Physics"],
            &["Nikola Tesla", "Physics"],
            &["Claude Shannon", "Math", "Computer Science"],
        ],
    ),
];

/// Add the demo lists. Timestamps start after `start` and strictly
/// increase. Returns the number of todos added.
pub async fn load<D>(dispatcher: &D, start: i64) -> Result<usize, DispatchError>
where
    D: Dispatcher + ?Sized,
{
    let mut timestamp = start;
    let mut added = 0;
    for (name, todos) in DEMO {
        let list = dispatcher.add_list(ListRecord::new(*name)).await?;
        for entry in todos.iter() {
            let Some((text, tags)) = entry.split_first() else {
                continue;
            };
            timestamp += 1;
            let todo = NewTodo::new(*text)
                .with_tags(tags.iter().copied())
                .with_timestamp(timestamp);
            dispatcher.add_todo(&list, todo).await?;
            added += 1;
        }
    }
    Ok(added)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use todos_client::{DispatcherConfig, MemStore, MemSyncGroups, SyncDispatcher};

    #[tokio::test]
    async fn seeds_three_lists() {
        let dispatcher = SyncDispatcher::new(
            Arc::new(MemStore::new()),
            Arc::new(MemSyncGroups::new("alice")),
            DispatcherConfig::default(),
        );
        assert_eq!(load(&dispatcher, 1000).await.unwrap(), 22);

        let lists = dispatcher.get_lists().await.unwrap();
        let names: Vec<_> = lists.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["Favorite Scientists", "Languages", "Meteor Principles"]);

        let scientists = dispatcher.get_todos(&lists[0].id).await.unwrap();
        assert_eq!(scientists[0].text, "Ada Lovelace");
        assert_eq!(scientists[0].tags, vec!["ComputerScience"]);
        assert!(scientists.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }
}
