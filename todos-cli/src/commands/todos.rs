//! Todo and tag commands.

use anyhow::Result;
use todos_client::Dispatcher;
use todos_types::{ListId, NewTodo, Todo, TodoId};

use crate::session::{Paths, Session};

/// Print the todos of a list.
pub async fn show(paths: &Paths, list: &str) -> Result<()> {
    let session = Session::open(paths).await?;
    let todos = session.dispatcher.get_todos(&ListId::new(list)).await?;
    if todos.is_empty() {
        println!("No todos.");
    }
    for todo in &todos {
        println!("{}", format_todo(todo));
    }
    Ok(())
}

fn format_todo(todo: &Todo) -> String {
    let check = if todo.done { "[x]" } else { "[ ]" };
    let tags: String = todo.tags.iter().map(|t| format!(" #{t}")).collect();
    format!("{check} {}{tags}\n    {}", todo.text, todo.id)
}

/// Add a todo and print its id.
pub async fn add(paths: &Paths, list: &str, text: &str, tags: Vec<String>) -> Result<()> {
    let session = Session::open(paths).await?;
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0);
    let todo = NewTodo::new(text)
        .with_tags(tags)
        .with_timestamp(timestamp);
    let id = session
        .dispatcher
        .add_todo(&ListId::new(list), todo)
        .await?;
    session.save().await?;
    println!("{id}");
    Ok(())
}

/// Set a todo's done flag.
pub async fn mark(paths: &Paths, todo: &str, done: bool) -> Result<()> {
    let session = Session::open(paths).await?;
    session
        .dispatcher
        .mark_todo_done(&TodoId::new(todo), done)
        .await?;
    session.save().await
}

/// Change a todo's text.
pub async fn edit(paths: &Paths, todo: &str, text: &str) -> Result<()> {
    let session = Session::open(paths).await?;
    session
        .dispatcher
        .edit_todo_text(&TodoId::new(todo), text)
        .await?;
    session.save().await
}

/// Remove a todo.
pub async fn remove(paths: &Paths, todo: &str) -> Result<()> {
    let session = Session::open(paths).await?;
    session.dispatcher.remove_todo(&TodoId::new(todo)).await?;
    session.save().await
}

/// Tag a todo.
pub async fn tag(paths: &Paths, todo: &str, tag: &str) -> Result<()> {
    let session = Session::open(paths).await?;
    session.dispatcher.add_tag(&TodoId::new(todo), tag).await?;
    session.save().await
}

/// Untag a todo.
pub async fn untag(paths: &Paths, todo: &str, tag: &str) -> Result<()> {
    let session = Session::open(paths).await?;
    session.dispatcher.remove_tag(&TodoId::new(todo), tag).await?;
    session.save().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_todo_shows_state_and_tags() {
        let todo = Todo {
            id: TodoId::new("L.todos.T"),
            text: "Milk".into(),
            done: true,
            timestamp: 0,
            tags: vec!["dairy".into(), "fridge".into()],
        };
        assert_eq!(format_todo(&todo), "[x] Milk #dairy #fridge\n    L.todos.T");
    }
}
