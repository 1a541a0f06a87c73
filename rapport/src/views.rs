//! Derived views
//!
//! Filtering, sorting and grouping over collection snapshots. Everything
//! here is a pure function of its inputs and returns new vectors.

use crate::config::{NO_CONTACT_NAME, UNKNOWN_NAME};
use crate::models::{Contact, Note, Priority, Task};
use chrono::NaiveDate;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContactSort {
    #[default]
    FirstName,
    LastName,
    /// Newest first
    DateAdded,
}

/// Case-insensitive match on names, email and company; substring on phone
pub fn search_contacts(contacts: &[Contact], query: &str) -> Vec<Contact> {
    let needle = query.to_lowercase();
    contacts
        .iter()
        .filter(|c| {
            c.first_name.to_lowercase().contains(&needle)
                || c.last_name.to_lowercase().contains(&needle)
                || c.email.to_lowercase().contains(&needle)
                || c.company.to_lowercase().contains(&needle)
                || c.phone.contains(query)
        })
        .cloned()
        .collect()
}

pub fn sort_contacts(contacts: &[Contact], sort: ContactSort) -> Vec<Contact> {
    let mut sorted = contacts.to_vec();
    match sort {
        ContactSort::FirstName => sorted.sort_by(|a, b| compare_text(&a.first_name, &b.first_name)),
        ContactSort::LastName => sorted.sort_by(|a, b| compare_text(&a.last_name, &b.last_name)),
        ContactSort::DateAdded => sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
    }
    sorted
}

fn compare_text(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b))
}

/// Display name for a linked contact
pub fn contact_name(contacts: &[Contact], contact_id: Option<&str>) -> String {
    let Some(id) = contact_id else {
        return NO_CONTACT_NAME.to_string();
    };
    contacts
        .iter()
        .find(|c| c.id == id)
        .map(Contact::full_name)
        .unwrap_or_else(|| UNKNOWN_NAME.to_string())
}

fn linked_name(contacts: &[Contact], contact_id: Option<&str>) -> String {
    contact_id
        .and_then(|id| contacts.iter().find(|c| c.id == id))
        .map(|c| c.full_name().to_lowercase())
        .unwrap_or_default()
}

pub fn notes_for_contact(notes: &[Note], contact_id: &str) -> Vec<Note> {
    notes
        .iter()
        .filter(|n| n.contact_id.as_deref() == Some(contact_id))
        .cloned()
        .collect()
}

pub fn tasks_for_contact(tasks: &[Task], contact_id: &str) -> Vec<Task> {
    tasks
        .iter()
        .filter(|t| t.contact_id.as_deref() == Some(contact_id))
        .cloned()
        .collect()
}

pub fn notes_for_project(notes: &[Note], project_id: &str) -> Vec<Note> {
    notes
        .iter()
        .filter(|n| n.project_id.as_deref() == Some(project_id))
        .cloned()
        .collect()
}

pub fn tasks_for_project(tasks: &[Task], project_id: &str) -> Vec<Task> {
    tasks
        .iter()
        .filter(|t| t.project_id.as_deref() == Some(project_id))
        .cloned()
        .collect()
}

/// Tasks whose title or linked contact name matches; empty query keeps all
pub fn search_tasks(tasks: &[Task], contacts: &[Contact], query: &str) -> Vec<Task> {
    if query.is_empty() {
        return tasks.to_vec();
    }
    let needle = query.to_lowercase();
    tasks
        .iter()
        .filter(|t| {
            t.title.to_lowercase().contains(&needle)
                || linked_name(contacts, t.contact_id.as_deref()).contains(&needle)
        })
        .cloned()
        .collect()
}

/// Notes whose content or linked contact name matches; empty query keeps all
pub fn search_notes(notes: &[Note], contacts: &[Contact], query: &str) -> Vec<Note> {
    if query.is_empty() {
        return notes.to_vec();
    }
    let needle = query.to_lowercase();
    notes
        .iter()
        .filter(|n| {
            n.content.to_lowercase().contains(&needle)
                || linked_name(contacts, n.contact_id.as_deref()).contains(&needle)
        })
        .cloned()
        .collect()
}

/// Newest call first; notes from the same day keep their order
pub fn sort_notes_by_call_date(notes: &[Note]) -> Vec<Note> {
    let mut sorted = notes.to_vec();
    sorted.sort_by(|a, b| b.call_date.cmp(&a.call_date));
    sorted
}

/// Notes grouped by call date, newest date first
pub fn group_notes_by_date(notes: &[Note]) -> Vec<(NaiveDate, Vec<Note>)> {
    let mut groups: Vec<(NaiveDate, Vec<Note>)> = Vec::new();
    for note in sort_notes_by_call_date(notes) {
        match groups.last_mut() {
            Some((date, group)) if *date == note.call_date => group.push(note),
            _ => groups.push((note.call_date, vec![note])),
        }
    }
    groups
}

/// Urgent first, then high, then low; within a priority the earliest due
/// date first and undated tasks last
pub fn sort_tasks_by_priority(tasks: &[Task]) -> Vec<Task> {
    let mut sorted = tasks.to_vec();
    sorted.sort_by(|a, b| {
        a.priority
            .rank()
            .cmp(&b.priority.rank())
            .then_with(|| match (a.due_date, b.due_date) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
    });
    sorted
}

/// Non-empty priority groups in display order
pub fn group_tasks_by_priority(tasks: &[Task]) -> Vec<(Priority, Vec<Task>)> {
    let sorted = sort_tasks_by_priority(tasks);
    [Priority::Urgent, Priority::High, Priority::Low]
        .into_iter()
        .map(|priority| {
            let group: Vec<Task> = sorted.iter().filter(|t| t.priority == priority).cloned().collect();
            (priority, group)
        })
        .filter(|(_, group)| !group.is_empty())
        .collect()
}

pub fn tasks_due_on(tasks: &[Task], date: NaiveDate) -> Vec<Task> {
    tasks
        .iter()
        .filter(|t| t.due_date == Some(date))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContactInput, NoteInput, TaskInput};
    use chrono::{Duration, TimeZone, Utc};

    fn contact(first: &str, last: &str) -> Contact {
        Contact::new(ContactInput {
            first_name: Some(first.to_string()),
            last_name: Some(last.to_string()),
            ..Default::default()
        })
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn note_on(contact_id: Option<&str>, content: &str, day: &str) -> Note {
        Note::new(
            contact_id.map(str::to_string),
            NoteInput {
                content: Some(content.to_string()),
                call_date: Some(date(day)),
                ..Default::default()
            },
        )
    }

    fn task(title: &str, priority: Priority, due: Option<&str>) -> Task {
        Task::new(
            None,
            TaskInput {
                title: Some(title.to_string()),
                priority: Some(priority),
                due_date: due.map(date),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_search_contacts() {
        let mut ada = contact("Ada", "Lovelace");
        ada.company = "Analytical Engines".to_string();
        let mut bob = contact("Bob", "Smith");
        bob.phone = "555-0101".to_string();
        let contacts = vec![ada.clone(), bob.clone()];

        assert_eq!(search_contacts(&contacts, "ANALYTICAL"), vec![ada.clone()]);
        assert_eq!(search_contacts(&contacts, "0101"), vec![bob]);
        assert_eq!(search_contacts(&contacts, "love"), vec![ada]);
        assert_eq!(search_contacts(&contacts, "").len(), 2);
    }

    #[test]
    fn test_sort_contacts() {
        let mut zed = contact("zed", "Adams");
        zed.created_at = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let mut amy = contact("Amy", "Young");
        amy.created_at = zed.created_at - Duration::days(1);
        let contacts = vec![zed.clone(), amy.clone()];

        let ids = |sorted: Vec<Contact>| sorted.into_iter().map(|c| c.id).collect::<Vec<_>>();

        assert_eq!(ids(sort_contacts(&contacts, ContactSort::FirstName)), vec![amy.id.clone(), zed.id.clone()]);
        assert_eq!(ids(sort_contacts(&contacts, ContactSort::LastName)), vec![zed.id.clone(), amy.id.clone()]);
        assert_eq!(ids(sort_contacts(&contacts, ContactSort::DateAdded)), vec![zed.id, amy.id]);
    }

    #[test]
    fn test_contact_name() {
        let ada = contact("Ada", "Lovelace");
        let contacts = vec![ada.clone()];

        assert_eq!(contact_name(&contacts, Some(&ada.id)), "Ada Lovelace");
        assert_eq!(contact_name(&contacts, Some("gone")), "Unknown");
        assert_eq!(contact_name(&contacts, None), "No Contact");
    }

    #[test]
    fn test_search_notes_matches_linked_contact() {
        let ada = contact("Ada", "Lovelace");
        let contacts = vec![ada.clone()];
        let notes = vec![
            note_on(Some(&ada.id), "Quarterly check-in", "2024-05-01"),
            note_on(None, "Lovely weather call", "2024-05-02"),
            note_on(None, "Budget", "2024-05-03"),
        ];

        let found = search_notes(&notes, &contacts, "lovel");
        assert_eq!(found.len(), 2);
        assert_eq!(search_notes(&notes, &contacts, "").len(), 3);
    }

    #[test]
    fn test_search_tasks_matches_title_or_contact() {
        let ada = contact("Ada", "Lovelace");
        let contacts = vec![ada.clone()];
        let mut linked = task("Send slides", Priority::Low, None);
        linked.contact_id = Some(ada.id.clone());
        let tasks = vec![linked.clone(), task("Book venue", Priority::High, None)];

        assert_eq!(search_tasks(&tasks, &contacts, "ada"), vec![linked]);
        assert_eq!(search_tasks(&tasks, &contacts, "VENUE").len(), 1);
    }

    #[test]
    fn test_filter_by_contact_and_project() {
        let mut note = note_on(Some("c1"), "x", "2024-01-01");
        note.project_id = Some("p1".to_string());
        let other = note_on(Some("c2"), "y", "2024-01-01");
        let notes = vec![note.clone(), other];

        assert_eq!(notes_for_contact(&notes, "c1"), vec![note.clone()]);
        assert_eq!(notes_for_project(&notes, "p1"), vec![note]);

        let mut t = task("t", Priority::Low, None);
        t.contact_id = Some("c1".to_string());
        t.project_id = Some("p1".to_string());
        let tasks = vec![t.clone()];
        assert_eq!(tasks_for_contact(&tasks, "c1"), vec![t.clone()]);
        assert_eq!(tasks_for_project(&tasks, "p1"), vec![t]);
        assert!(tasks_for_project(&tasks, "p2").is_empty());
    }

    #[test]
    fn test_group_notes_by_date() {
        let notes = vec![
            note_on(None, "a", "2024-05-01"),
            note_on(None, "b", "2024-05-03"),
            note_on(None, "c", "2024-05-01"),
        ];

        let groups = group_notes_by_date(&notes);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, date("2024-05-03"));
        let contents: Vec<&str> = groups[1].1.iter().map(|n| n.content.as_str()).collect();
        assert_eq!(contents, vec!["a", "c"]);
    }

    #[test]
    fn test_sort_and_group_tasks_by_priority() {
        let tasks = vec![
            task("low-undated", Priority::Low, None),
            task("urgent-late", Priority::Urgent, Some("2024-06-10")),
            task("low-dated", Priority::Low, Some("2024-06-01")),
            task("urgent-early", Priority::Urgent, Some("2024-06-01")),
        ];

        let titles: Vec<String> = sort_tasks_by_priority(&tasks).into_iter().map(|t| t.title).collect();
        assert_eq!(titles, vec!["urgent-early", "urgent-late", "low-dated", "low-undated"]);

        let groups = group_tasks_by_priority(&tasks);
        let priorities: Vec<Priority> = groups.iter().map(|(p, _)| *p).collect();
        assert_eq!(priorities, vec![Priority::Urgent, Priority::Low]);
    }

    #[test]
    fn test_tasks_due_on() {
        let tasks = vec![
            task("a", Priority::Low, Some("2024-06-01")),
            task("b", Priority::Low, None),
        ];
        let due = tasks_due_on(&tasks, date("2024-06-01"));
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].title, "a");
    }
}
