//! Workspace service
//!
//! Owns the five synced collections and implements the application-level
//! operations on them, including the cross-collection cascades:
//!
//! - deleting a contact deletes its notes and active tasks
//! - deleting a project clears `projectId` on notes and tasks
//! - completing a task moves it to the archive; restoring moves it back

use super::attachments::{add_to, remove_from, ParentKind};
use crate::config::{
    ARCHIVED_TASKS_COLLECTION, CONTACTS_COLLECTION, NOTES_COLLECTION, PROJECTS_COLLECTION,
    TASKS_COLLECTION,
};
use crate::models::{
    timestamp, Attachment, Contact, ContactInput, ContactPatch, Note, NoteInput, NotePatch,
    Project, ProjectPatch, Task, TaskInput, TaskPatch,
};
use crate::session::Session;
use crate::storage::{LocalStore, RemoteStore};
use crate::sync::{SyncItem, SyncedCollection};
use std::sync::Arc;

#[derive(Clone)]
pub struct Workspace {
    pub contacts: SyncedCollection<Contact>,
    pub notes: SyncedCollection<Note>,
    pub tasks: SyncedCollection<Task>,
    pub archived_tasks: SyncedCollection<Task>,
    pub projects: SyncedCollection<Project>,
}

impl Workspace {
    pub fn new(local: Arc<dyn LocalStore>, remote: Arc<dyn RemoteStore>) -> Self {
        Self {
            contacts: SyncedCollection::new(
                CONTACTS_COLLECTION,
                Vec::new(),
                local.clone(),
                remote.clone(),
            ),
            notes: SyncedCollection::new(NOTES_COLLECTION, Vec::new(), local.clone(), remote.clone()),
            tasks: SyncedCollection::new(TASKS_COLLECTION, Vec::new(), local.clone(), remote.clone()),
            archived_tasks: SyncedCollection::new(
                ARCHIVED_TASKS_COLLECTION,
                Vec::new(),
                local.clone(),
                remote.clone(),
            ),
            projects: SyncedCollection::new(PROJECTS_COLLECTION, Vec::new(), local, remote),
        }
    }

    /// Follow the session's identity in every collection
    pub fn start(&self, session: &Session) {
        self.contacts.start(session);
        self.notes.start(session);
        self.tasks.start(session);
        self.archived_tasks.start(session);
        self.projects.start(session);
    }

    pub fn stop(&self) {
        self.contacts.stop();
        self.notes.stop();
        self.tasks.stop();
        self.archived_tasks.stop();
        self.projects.stop();
    }

    /// Wait for every collection's in-flight remote work
    pub async fn flush(&self) {
        tokio::join!(
            self.contacts.flush(),
            self.notes.flush(),
            self.tasks.flush(),
            self.archived_tasks.flush(),
            self.projects.flush(),
        );
    }

    // ===== Contacts =====

    pub fn add_contact(&self, input: ContactInput) -> Contact {
        let contact = Contact::new(input);
        tracing::info!("Adding contact: {}", contact.id);
        self.contacts.update(|prev| append(prev, contact.clone()));
        contact
    }

    /// Apply a patch to one contact; `None` if it doesn't exist
    pub fn update_contact(&self, id: &str, patch: ContactPatch) -> Option<Contact> {
        replace_where(&self.contacts, id, |contact| contact.apply(patch))
    }

    /// Save the editor HTML for a contact and stamp when it changed
    pub fn update_contact_notes(&self, id: &str, html: String) -> Option<Contact> {
        self.update_contact(
            id,
            ContactPatch {
                contact_notes: Some(html),
                contact_notes_updated_at: Some(Some(timestamp())),
                ..Default::default()
            },
        )
    }

    /// Delete a contact together with its notes and active tasks
    pub fn delete_contact(&self, id: &str) {
        tracing::info!("Deleting contact: {} with its notes and tasks", id);
        self.contacts.update(|prev| without(prev, id));
        self.notes.update(|prev| {
            prev.iter()
                .filter(|n| n.contact_id.as_deref() != Some(id))
                .cloned()
                .collect()
        });
        self.tasks.update(|prev| {
            prev.iter()
                .filter(|t| t.contact_id.as_deref() != Some(id))
                .cloned()
                .collect()
        });
    }

    // ===== Notes =====

    pub fn add_note(&self, contact_id: Option<&str>, input: NoteInput) -> Note {
        let note = Note::new(contact_id.map(str::to_string), input);
        tracing::info!("Adding note: {}", note.id);
        self.notes.update(|prev| prepend(prev, note.clone()));
        note
    }

    pub fn update_note(&self, id: &str, patch: NotePatch) -> Option<Note> {
        replace_where(&self.notes, id, |note| note.apply(patch))
    }

    pub fn delete_note(&self, id: &str) {
        self.notes.update(|prev| without(prev, id));
    }

    // ===== Tasks =====

    /// New task linked to a contact
    pub fn add_task(&self, contact_id: &str, input: TaskInput) -> Task {
        self.insert_task(Task::new(Some(contact_id.to_string()), input))
    }

    /// New task without a contact
    pub fn add_standalone_task(&self, input: TaskInput) -> Task {
        self.insert_task(Task::new(None, input))
    }

    fn insert_task(&self, task: Task) -> Task {
        tracing::info!("Adding task: {}", task.id);
        self.tasks.update(|prev| prepend(prev, task.clone()));
        task
    }

    pub fn update_task(&self, id: &str, patch: TaskPatch) -> Option<Task> {
        replace_where(&self.tasks, id, |task| task.apply(patch))
    }

    pub fn delete_task(&self, id: &str) {
        self.tasks.update(|prev| without(prev, id));
    }

    /// Complete an open task by moving it to the archive; a task already
    /// marked completed in the active list is flipped back instead
    pub fn toggle_task(&self, id: &str) {
        let mut archived = None;
        self.tasks.update(|prev| match prev.iter().find(|t| t.id == id) {
            Some(task) if !task.completed => {
                archived = Some(task.archived(timestamp()));
                without(prev, id)
            }
            Some(_) => prev
                .iter()
                .map(|t| {
                    let mut t = t.clone();
                    if t.id == id {
                        t.completed = !t.completed;
                    }
                    t
                })
                .collect(),
            None => prev.to_vec(),
        });

        if let Some(task) = archived {
            tracing::info!("Archiving completed task: {}", task.id);
            self.archived_tasks.update(|prev| prepend(prev, task));
        }
    }

    /// Move an archived task back to the head of the active list
    pub fn restore_task(&self, id: &str) -> Option<Task> {
        let mut restored = None;
        self.archived_tasks.update(|prev| match prev.iter().find(|t| t.id == id) {
            Some(task) => {
                restored = Some(task.restored());
                without(prev, id)
            }
            None => prev.to_vec(),
        });

        let task = restored?;
        tracing::info!("Restoring task: {}", task.id);
        self.tasks.update(|prev| prepend(prev, task.clone()));
        Some(task)
    }

    pub fn delete_archived_task(&self, id: &str) {
        self.archived_tasks.update(|prev| without(prev, id));
    }

    // ===== Projects =====

    pub fn add_project(&self, name: &str, color: Option<String>) -> Project {
        let project = Project::new(name, color);
        tracing::info!("Adding project: {} ({})", project.name, project.id);
        self.projects.update(|prev| append(prev, project.clone()));
        project
    }

    pub fn update_project(&self, id: &str, patch: ProjectPatch) -> Option<Project> {
        replace_where(&self.projects, id, |project| project.apply(patch))
    }

    /// Delete a project and unlink it from notes and tasks
    pub fn delete_project(&self, id: &str) {
        tracing::info!("Deleting project: {}", id);
        self.projects.update(|prev| without(prev, id));
        self.notes.update(|prev| {
            prev.iter()
                .map(|n| {
                    let mut n = n.clone();
                    if n.project_id.as_deref() == Some(id) {
                        n.project_id = None;
                    }
                    n
                })
                .collect()
        });
        self.tasks.update(|prev| {
            prev.iter()
                .map(|t| {
                    let mut t = t.clone();
                    if t.project_id.as_deref() == Some(id) {
                        t.project_id = None;
                    }
                    t
                })
                .collect()
        });
    }

    // ===== Attachments =====

    /// Record an uploaded or linked attachment on its parent record
    pub fn add_attachment(&self, parent: ParentKind, parent_id: &str, attachment: Attachment) -> bool {
        match parent {
            ParentKind::Contacts => replace_where(&self.contacts, parent_id, |c| Contact {
                biography_attachments: add_to(&c.biography_attachments, attachment),
                ..c.clone()
            })
            .is_some(),
            ParentKind::Notes => replace_where(&self.notes, parent_id, |n| Note {
                attachments: add_to(&n.attachments, attachment),
                ..n.clone()
            })
            .is_some(),
            ParentKind::Tasks => replace_where(&self.tasks, parent_id, |t| Task {
                attachments: add_to(&t.attachments, attachment),
                ..t.clone()
            })
            .is_some(),
        }
    }

    /// Drop an attachment from its parent record, returning it if found
    pub fn remove_attachment(
        &self,
        parent: ParentKind,
        parent_id: &str,
        attachment_id: &str,
    ) -> Option<Attachment> {
        let find = |list: &[Attachment]| list.iter().find(|a| a.id() == attachment_id).cloned();

        match parent {
            ParentKind::Contacts => {
                let contact = self.contacts.value().into_iter().find(|c| c.id == parent_id)?;
                let found = find(&contact.biography_attachments)?;
                replace_where(&self.contacts, parent_id, |c| Contact {
                    biography_attachments: remove_from(&c.biography_attachments, attachment_id),
                    ..c.clone()
                });
                Some(found)
            }
            ParentKind::Notes => {
                let note = self.notes.value().into_iter().find(|n| n.id == parent_id)?;
                let found = find(&note.attachments)?;
                replace_where(&self.notes, parent_id, |n| Note {
                    attachments: remove_from(&n.attachments, attachment_id),
                    ..n.clone()
                });
                Some(found)
            }
            ParentKind::Tasks => {
                let task = self.tasks.value().into_iter().find(|t| t.id == parent_id)?;
                let found = find(&task.attachments)?;
                replace_where(&self.tasks, parent_id, |t| Task {
                    attachments: remove_from(&t.attachments, attachment_id),
                    ..t.clone()
                });
                Some(found)
            }
        }
    }
}

fn append<T: Clone>(items: &[T], item: T) -> Vec<T> {
    let mut next = items.to_vec();
    next.push(item);
    next
}

fn prepend<T: Clone>(items: &[T], item: T) -> Vec<T> {
    let mut next = Vec::with_capacity(items.len() + 1);
    next.push(item);
    next.extend_from_slice(items);
    next
}

fn without<T: SyncItem>(items: &[T], id: &str) -> Vec<T> {
    items.iter().filter(|item| item.id() != id).cloned().collect()
}

/// Replace the item with `id` by `f(item)`, returning the replacement
fn replace_where<T, F>(collection: &SyncedCollection<T>, id: &str, f: F) -> Option<T>
where
    T: SyncItem,
    F: FnOnce(&T) -> T,
{
    let mut f = Some(f);
    let mut replaced = None;

    collection.update(|prev| {
        prev.iter()
            .map(|item| match f.take() {
                Some(f) if item.id() == id => {
                    let next = f(item);
                    replaced = Some(next.clone());
                    next
                }
                pending => {
                    f = pending;
                    item.clone()
                }
            })
            .collect()
    });

    replaced
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Priority;
    use crate::services::attachments::create_link;
    use crate::storage::{MemoryRemote, MemoryStore};

    fn create_test_workspace() -> Workspace {
        Workspace::new(Arc::new(MemoryStore::new()), Arc::new(MemoryRemote::new()))
    }

    fn named(first: &str) -> ContactInput {
        ContactInput {
            first_name: Some(first.to_string()),
            ..Default::default()
        }
    }

    fn titled(title: &str) -> TaskInput {
        TaskInput {
            title: Some(title.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_contacts_append_and_notes_prepend() {
        let ws = create_test_workspace();
        let ada = ws.add_contact(named("Ada"));
        let bob = ws.add_contact(named("Bob"));

        let first = ws.add_note(Some(&ada.id), NoteInput::default());
        let second = ws.add_note(Some(&bob.id), NoteInput::default());

        let contacts: Vec<String> = ws.contacts.value().into_iter().map(|c| c.id).collect();
        assert_eq!(contacts, vec![ada.id, bob.id]);

        let notes: Vec<String> = ws.notes.value().into_iter().map(|n| n.id).collect();
        assert_eq!(notes, vec![second.id, first.id]);
    }

    #[tokio::test]
    async fn test_update_contact_keeps_identity_fields() {
        let ws = create_test_workspace();
        let ada = ws.add_contact(named("Ada"));

        let updated = ws
            .update_contact(
                &ada.id,
                ContactPatch {
                    company: Some("Analytical Engines".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(updated.id, ada.id);
        assert_eq!(updated.created_at, ada.created_at);
        assert_eq!(updated.first_name, "Ada");
        assert_eq!(ws.contacts.value()[0].company, "Analytical Engines");
        assert!(ws.update_contact("missing", ContactPatch::default()).is_none());
    }

    #[tokio::test]
    async fn test_update_contact_notes_stamps_time() {
        let ws = create_test_workspace();
        let ada = ws.add_contact(named("Ada"));

        let updated = ws.update_contact_notes(&ada.id, "<p>Met at the conference</p>".to_string()).unwrap();

        assert_eq!(updated.contact_notes, "<p>Met at the conference</p>");
        assert!(updated.contact_notes_updated_at.is_some());
    }

    #[tokio::test]
    async fn test_delete_contact_cascades() {
        let ws = create_test_workspace();
        let ada = ws.add_contact(named("Ada"));
        let bob = ws.add_contact(named("Bob"));
        ws.add_note(Some(&ada.id), NoteInput::default());
        let bobs_note = ws.add_note(Some(&bob.id), NoteInput::default());
        ws.add_task(&ada.id, titled("Send slides"));
        let standalone = ws.add_standalone_task(titled("Book venue"));

        ws.delete_contact(&ada.id);

        assert_eq!(ws.contacts.value().len(), 1);
        assert_eq!(ws.notes.value(), vec![bobs_note]);
        assert_eq!(ws.tasks.value(), vec![standalone]);
    }

    #[tokio::test]
    async fn test_toggle_archives_and_restore_reverses() {
        let ws = create_test_workspace();
        let other = ws.add_standalone_task(titled("Other"));
        let task = ws.add_standalone_task(TaskInput {
            title: Some("Follow up".to_string()),
            priority: Some(Priority::Urgent),
            ..Default::default()
        });

        ws.toggle_task(&task.id);

        assert_eq!(ws.tasks.value(), vec![other.clone()]);
        let archived = ws.archived_tasks.value();
        assert_eq!(archived.len(), 1);
        assert!(archived[0].completed);
        assert!(archived[0].archived_at.is_some());

        let restored = ws.restore_task(&task.id).unwrap();

        assert!(ws.archived_tasks.value().is_empty());
        assert_eq!(ws.tasks.value(), vec![restored.clone(), other]);
        assert!(!restored.completed);
        assert!(restored.archived_at.is_none());
        assert_eq!(restored.title, task.title);
        assert_eq!(restored.priority, task.priority);
        assert_eq!(restored.created_at, task.created_at);
    }

    #[tokio::test]
    async fn test_toggle_completed_active_task_flips_back() {
        let ws = create_test_workspace();
        let task = ws.add_standalone_task(titled("Odd one"));
        ws.update_task(
            &task.id,
            TaskPatch {
                completed: Some(true),
                ..Default::default()
            },
        );

        ws.toggle_task(&task.id);

        assert!(!ws.tasks.value()[0].completed);
        assert!(ws.archived_tasks.value().is_empty());
    }

    #[tokio::test]
    async fn test_restore_missing_task_does_nothing() {
        let ws = create_test_workspace();
        assert!(ws.restore_task("missing").is_none());
        assert!(ws.tasks.value().is_empty());
    }

    #[tokio::test]
    async fn test_delete_archived_task() {
        let ws = create_test_workspace();
        let task = ws.add_standalone_task(titled("Done"));
        ws.toggle_task(&task.id);

        ws.delete_archived_task(&task.id);

        assert!(ws.archived_tasks.value().is_empty());
    }

    #[tokio::test]
    async fn test_delete_project_nulls_references() {
        let ws = create_test_workspace();
        let hiring = ws.add_project("Hiring", None);
        let sales = ws.add_project("Sales", Some("#000000".to_string()));

        ws.add_note(
            None,
            NoteInput {
                project_id: Some(hiring.id.clone()),
                ..Default::default()
            },
        );
        ws.add_standalone_task(TaskInput {
            project_id: Some(hiring.id.clone()),
            ..Default::default()
        });
        ws.add_standalone_task(TaskInput {
            project_id: Some(sales.id.clone()),
            ..Default::default()
        });

        ws.delete_project(&hiring.id);

        assert_eq!(ws.projects.value(), vec![sales.clone()]);
        assert!(ws.notes.value().iter().all(|n| n.project_id.is_none()));
        let linked: Vec<Option<String>> = ws.tasks.value().into_iter().map(|t| t.project_id).collect();
        assert_eq!(linked, vec![Some(sales.id), None]);
    }

    #[tokio::test]
    async fn test_add_and_remove_attachment_on_parent() {
        let ws = create_test_workspace();
        let note = ws.add_note(None, NoteInput::default());
        let link = create_link("https://example.com/deck", "Deck").unwrap();

        assert!(ws.add_attachment(ParentKind::Notes, &note.id, link.clone()));
        assert_eq!(ws.notes.value()[0].attachments, vec![link.clone()]);

        let removed = ws.remove_attachment(ParentKind::Notes, &note.id, link.id());
        assert_eq!(removed, Some(link));
        assert!(ws.notes.value()[0].attachments.is_empty());

        assert!(!ws.add_attachment(
            ParentKind::Contacts,
            "missing",
            create_link("https://example.com", "").unwrap()
        ));
    }
}
