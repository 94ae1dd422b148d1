use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use ideaboard_backend::{Backend, BackendError};
use ideaboard_cache::QueryState;
use ideaboard_data::Table;
use ideaboard_types::{Idea, IdeaPatch, NewIdea};

use crate::command::{Command, IdeaField};
use crate::render;

pub const NOTIFICATION_TTL: Duration = Duration::from_secs(6);
const MAX_NOTIFICATIONS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub level: Level,
    pub message: String,
    expires_at: Instant,
}

/// The new-idea form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdeaDraft {
    pub title: String,
    pub description: String,
    /// Collected for the user but not part of the `ideas` table.
    pub category: String,
}

impl IdeaDraft {
    pub fn set(&mut self, field: IdeaField, value: String) {
        match field {
            IdeaField::Title => self.title = value,
            IdeaField::Description => self.description = value,
            IdeaField::Category => self.category = value,
        }
    }

    pub fn to_new_idea(&self) -> NewIdea {
        NewIdea {
            user_id: None,
            title: self.title.clone(),
            description: non_empty(&self.description),
        }
    }
}

fn non_empty(s: &str) -> Option<String> {
    (!s.trim().is_empty()).then(|| s.to_string())
}

#[derive(Debug, Clone)]
pub enum PageState {
    Loading,
    Ready(Arc<Vec<Idea>>),
    /// List fetch failed. Only a refetch gets the page out of here.
    Failed(String),
}

/// Result of a mutation task, fed back through [`IdeasPage::finish`].
#[derive(Debug)]
pub enum Outcome {
    Added {
        draft: IdeaDraft,
        result: Result<Idea, BackendError>,
    },
    Edited {
        field: IdeaField,
        result: Result<Idea, BackendError>,
    },
    Deleted {
        id: Uuid,
        result: Result<(), BackendError>,
    },
}

/// The "Messaging Ideas" page: a form, a table, and transient notifications.
///
/// Mutations run as spawned tasks so the page keeps rendering while they
/// are in flight; each one reports back as an [`Outcome`] on the channel
/// given to [`new`](Self::new). The table only changes once the list query
/// refetches after the mutation.
pub struct IdeasPage<B> {
    ideas: Table<Idea, B>,
    outcomes: mpsc::UnboundedSender<Outcome>,
    state: PageState,
    draft: IdeaDraft,
    in_flight: usize,
    notifications: VecDeque<Notification>,
}

impl<B: Backend> IdeasPage<B> {
    pub fn new(ideas: Table<Idea, B>, outcomes: mpsc::UnboundedSender<Outcome>) -> Self {
        Self {
            ideas,
            outcomes,
            state: PageState::Loading,
            draft: IdeaDraft::default(),
            in_flight: 0,
            notifications: VecDeque::new(),
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> &PageState {
        &self.state
    }

    #[cfg(test)]
    pub fn draft(&self) -> &IdeaDraft {
        &self.draft
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Notifications that have not expired yet, oldest first.
    pub fn notifications(&self) -> Vec<&Notification> {
        let now = Instant::now();
        self.notifications
            .iter()
            .filter(|n| n.expires_at > now)
            .collect()
    }

    pub fn notify(&mut self, level: Level, message: impl Into<String>) {
        let now = Instant::now();
        self.notifications.retain(|n| n.expires_at > now);
        if self.notifications.len() == MAX_NOTIFICATIONS {
            self.notifications.pop_front();
        }
        self.notifications.push_back(Notification {
            level,
            message: message.into(),
            expires_at: now + NOTIFICATION_TTL,
        });
    }

    /// Take the latest state of the watched ideas list.
    pub fn apply(&mut self, state: QueryState<Vec<Idea>, BackendError>) {
        self.state = match state {
            QueryState::Loading => PageState::Loading,
            QueryState::Ready(ideas) => PageState::Ready(ideas),
            QueryState::Failed(e) => PageState::Failed(e.message),
        };
    }

    /// Run a page-level command. Refresh, help and quit belong to the
    /// surrounding loop and are ignored here.
    pub fn dispatch(&mut self, command: Command) {
        match command {
            Command::Draft(field, value) => self.draft.set(field, value),
            Command::Add => self.submit(),
            Command::Edit {
                target,
                field,
                value,
            } => self.edit(&target, field, value),
            Command::Delete(target) => self.delete(&target),
            Command::Refresh | Command::Help | Command::Quit => {}
        }
    }

    pub fn submit(&mut self) {
        let draft = self.draft.clone();
        let category = draft.category.trim();
        if !category.is_empty() {
            warn!(category, "idea category is not stored by the backend");
            self.notify(
                Level::Warning,
                format!("Category \"{}\" is not stored by the backend", category),
            );
        }

        let new = draft.to_new_idea();
        let ideas = self.ideas.clone();
        self.spawn(async move {
            let result = ideas.add(&new).await;
            Outcome::Added { draft, result }
        });
    }

    /// Change one field of a loaded idea. Only that field is sent, so
    /// concurrent changes to the other columns survive.
    pub fn edit(&mut self, target: &str, field: IdeaField, value: String) {
        let id = match self.locate(target) {
            Ok(idea) => idea.id,
            Err(message) => return self.notify(Level::Error, message),
        };

        let patch = match field {
            IdeaField::Title => IdeaPatch {
                title: Some(value),
                ..Default::default()
            },
            IdeaField::Description => IdeaPatch {
                description: Some(non_empty(&value)),
                ..Default::default()
            },
            IdeaField::Category => {
                warn!(%id, "edit of idea category ignored, column does not exist");
                return self.notify(Level::Error, "Category is not stored by the backend; edit ignored");
            }
        };

        let ideas = self.ideas.clone();
        self.spawn(async move {
            let result = ideas.patch(id, &patch).await;
            Outcome::Edited { field, result }
        });
    }

    /// A full id is sent as is, loaded or not, and the backend decides
    /// whether it exists. A prefix must match exactly one loaded idea.
    pub fn delete(&mut self, target: &str) {
        let id = match target.parse::<Uuid>() {
            Ok(id) => id,
            Err(_) => match self.locate(target) {
                Ok(idea) => idea.id,
                Err(message) => return self.notify(Level::Error, message),
            },
        };

        let ideas = self.ideas.clone();
        self.spawn(async move {
            let result = ideas.delete(id).await;
            Outcome::Deleted { id, result }
        });
    }

    pub fn finish(&mut self, outcome: Outcome) {
        self.in_flight = self.in_flight.saturating_sub(1);

        match outcome {
            Outcome::Added {
                draft,
                result: Ok(idea),
            } => {
                // Leave the form alone if the user kept typing meanwhile.
                if self.draft == draft {
                    self.draft = IdeaDraft::default();
                }
                self.notify(Level::Success, format!("Added \"{}\"", idea.title));
            }
            Outcome::Added { result: Err(e), .. } => {
                self.notify(Level::Error, format!("Could not add idea: {}", e));
            }
            Outcome::Edited {
                field,
                result: Ok(idea),
            } => {
                self.notify(Level::Success, format!("Updated {} of \"{}\"", field, idea.title));
            }
            Outcome::Edited {
                field,
                result: Err(e),
            } => {
                self.notify(Level::Error, format!("Could not update {}: {}", field, e));
            }
            Outcome::Deleted { id, result: Ok(()) } => {
                self.notify(Level::Success, format!("Deleted {}", render::short_id(id)));
            }
            Outcome::Deleted { result: Err(e), .. } => {
                self.notify(Level::Error, format!("Could not delete idea: {}", e));
            }
        }
    }

    pub fn render(&self) -> String {
        render::page(&self.state, &self.draft, self.in_flight, &self.notifications())
    }

    /// Find a loaded idea by full id or unique id prefix.
    fn locate(&self, target: &str) -> Result<&Idea, String> {
        let PageState::Ready(ideas) = &self.state else {
            return Err("Ideas are not loaded".to_string());
        };

        if let Ok(id) = target.parse::<Uuid>() {
            return ideas
                .iter()
                .find(|idea| idea.id == id)
                .ok_or_else(|| format!("No idea with id {}", id));
        }

        let prefix = target.to_ascii_lowercase();
        let mut matching = ideas
            .iter()
            .filter(|idea| idea.id.to_string().starts_with(&prefix));
        match (matching.next(), matching.next()) {
            (Some(idea), None) => Ok(idea),
            (None, _) => Err(format!("No idea with id {}", target)),
            (Some(_), Some(_)) => Err(format!("Id prefix {} matches several ideas", target)),
        }
    }

    fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = Outcome> + Send + 'static,
    {
        self.in_flight += 1;
        debug!(in_flight = self.in_flight, "mutation started");
        let outcomes = self.outcomes.clone();
        tokio::spawn(async move {
            // Receiver gone means the page is gone; nobody to tell.
            let _ = outcomes.send(task.await);
        });
    }
}
