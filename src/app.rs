use std::{result, sync::Arc};

use log::{debug, error, info, trace, warn};

use crate::backend::{Backend, FindError, InsertError};
use crate::feedback::{Feedback, FeedbackForm};
use crate::form::FormErrors;
use crate::password::Hasher;
use crate::session::{SessionConfig, SessionId};
use crate::time::Timestamp;
use crate::user::{Login, Registration, UniqueField, User};

pub struct App {
    backend: Backend,
    hasher: Hasher,
    sessions: SessionConfig,
}

/// A request with a live session. Only `Authed<true>`, produced by matching
/// the session against the resource's owner, can touch user data.
pub struct Authed<const OWNER_MATCH: bool = false> {
    app: Arc<App>,
    session_id: SessionId,
    username: String,
}

#[derive(Debug)]
pub enum Error {
    Internal,
    Unauthorized,
    NotFound,
    BadCredentials,
    DuplicateKey(UniqueField),
    Invalid(FormErrors),
}

pub type Result<T> = result::Result<T, Error>;

impl warp::reject::Reject for Error {}

#[derive(Debug)]
pub enum Verdict {
    Accepted(User),
    NoSuchUser,
    WrongPassword,
}

impl App {
    pub fn new(backend: Backend, hasher: Hasher, sessions: SessionConfig) -> Self {
        Self {
            backend,
            hasher,
            sessions,
        }
    }

    pub fn sessions(&self) -> &SessionConfig {
        &self.sessions
    }

    #[cfg(test)]
    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub async fn register(
        self: &Arc<Self>,
        form: Registration,
        client_session_id: Option<SessionId>,
    ) -> Result<Authed<true>> {
        form.check().map_err(Error::Invalid)?;

        let Registration {
            username,
            password,
            email,
            first_name,
            last_name,
        } = form;

        let pwhash = self.hash(password).await?;
        let user = User {
            username,
            pwhash,
            email,
            first_name,
            last_name,
        };

        self.backend.insert_user(&user).await.map_err(|e| match e {
            InsertError::Duplicate(field) => {
                info!("rejecting registration of {}: {field:?} taken", user.username);
                Error::DuplicateKey(field)
            }
            InsertError::Internal => Error::Internal,
        })?;

        info!("{} registered", user.username);
        self.start_session(user.username, client_session_id).await
    }

    pub async fn check_credentials(&self, username: &str, password: &str) -> Result<Verdict> {
        let user = match self.backend.find_user(username).await {
            Ok(user) => user,
            Err(FindError::NotFound) => return Ok(Verdict::NoSuchUser),
            Err(FindError::Internal) => {
                error!("couldn't authenticate user {username}");
                return Err(Error::Internal);
            }
        };

        let hasher = self.hasher.clone();
        let password = password.to_string();
        let pwhash = user.pwhash.clone();

        let matches = tokio::task::spawn_blocking(move || hasher.verify(&password, &pwhash))
            .await
            .map_err(|e| {
                error!("password verification task failed: {e}");
                Error::Internal
            })?;

        Ok(if matches {
            Verdict::Accepted(user)
        } else {
            Verdict::WrongPassword
        })
    }

    pub async fn login(
        self: &Arc<Self>,
        form: Login,
        client_session_id: Option<SessionId>,
    ) -> Result<Authed<true>> {
        form.check().map_err(Error::Invalid)?;

        let username = &form.username;
        match self.check_credentials(username, &form.password).await? {
            Verdict::Accepted(user) => {
                info!("{username} login");
                self.start_session(user.username, client_session_id).await
            }
            Verdict::NoSuchUser => {
                warn!("rejecting non-existant user {username}");
                Err(Error::BadCredentials)
            }
            Verdict::WrongPassword => {
                warn!("wrong password for user {username}");
                Err(Error::BadCredentials)
            }
        }
    }

    /// Look up the identity behind `session_id`, if there is a live one.
    pub async fn authenticate(self: &Arc<Self>, session_id: Option<SessionId>) -> Result<Authed> {
        let Some(session_id) = session_id else {
            debug!("anonymous request");
            return Err(Error::Unauthorized);
        };
        let session_str = session_id.to_string();

        let session = self
            .backend
            .find_session(&session_str)
            .await
            .map_err(|e| match e {
                FindError::NotFound => {
                    info!("no user found for session {session_id}");
                    Error::Unauthorized
                }
                FindError::Internal => Error::Internal,
            })?;

        if session.created < self.sessions.expiry_cutoff(Timestamp::now()) {
            info!(
                "{} session {session_id} expired (created {})",
                session.username, session.created
            );
            self.backend
                .delete_session(&session_str)
                .await
                .map_err(|()| Error::Internal)?;
            return Err(Error::Unauthorized);
        }

        debug!("found user by session");
        Ok(Authed {
            app: Arc::clone(self),
            session_id,
            username: session.username,
        })
    }

    /// Ends the session, if there is one. Nothing to end is not an error.
    pub async fn logout(&self, session_id: Option<SessionId>) -> Result<()> {
        let Some(session_id) = session_id else {
            debug!("logout without a session");
            return Ok(());
        };

        let existed = self
            .backend
            .delete_session(&session_id.to_string())
            .await
            .map_err(|()| Error::Internal)?;

        if existed {
            info!("session {session_id} logged out");
        } else {
            debug!("logout of unknown session {session_id}");
        }
        Ok(())
    }

    async fn start_session(
        self: &Arc<Self>,
        username: String,
        previous: Option<SessionId>,
    ) -> Result<Authed<true>> {
        let session_id = SessionId::new();
        let now = Timestamp::now();
        let previous = previous.map(|id| id.to_string());

        self.backend
            .start_session(
                previous.as_deref(),
                &session_id.to_string(),
                &username,
                now,
                self.sessions.expiry_cutoff(now),
            )
            .await
            .map_err(|()| {
                error!("couldn't start session for {username}");
                Error::Internal
            })?;

        info!("{username}: new session created");
        Ok(Authed {
            app: Arc::clone(self),
            session_id,
            username,
        })
    }

    async fn hash(&self, password: String) -> Result<String> {
        let hasher = self.hasher.clone();

        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| {
                error!("password hashing task failed: {e}");
                Error::Internal
            })?
            .map_err(|()| Error::Internal)
    }
}

impl<const OWNER_MATCH: bool> Authed<OWNER_MATCH> {
    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }
}

impl Authed {
    pub fn with_user(self, username: &str) -> Result<Authed<true>> {
        if username == self.username {
            Ok(Authed {
                app: self.app,
                session_id: self.session_id,
                username: self.username,
            })
        } else {
            error!(
                "mismatching session & username: session={{ username: {}, session_id: {} }}, username={username}",
                self.username,
                self.session_id,
            );
            Err(Error::Unauthorized)
        }
    }

    /// Load feedback `id`, granting access only if this session owns it.
    pub async fn with_feedback(self, id: i64) -> Result<(Authed<true>, Feedback)> {
        let feedback = self.app.backend.find_feedback(id).await.map_err(|e| match e {
            FindError::NotFound => {
                info!("{} asked for missing feedback {id}", self.username);
                Error::NotFound
            }
            FindError::Internal => Error::Internal,
        })?;

        let authed = self.with_user(&feedback.username)?;
        Ok((authed, feedback))
    }
}

impl Authed<true> {
    pub async fn user(&self) -> Result<User> {
        let username = &self.username;
        trace!("{username} getting profile");

        self.app.backend.find_user(username).await.map_err(|e| {
            error!("session for {username} but no user: {e:?}");
            Error::Internal
        })
    }

    pub async fn feedback(&self) -> Result<Vec<Feedback>> {
        let username = &self.username;
        trace!("{username} getting feedback");

        self.app
            .backend
            .feedback_for_user(username)
            .await
            .map(|feedback| {
                debug!("{username}, {} feedback entries", feedback.len());
                feedback
            })
            .map_err(|()| Error::Internal)
    }

    pub async fn add_feedback(&self, form: FeedbackForm) -> Result<Feedback> {
        form.check().map_err(Error::Invalid)?;

        self.app
            .backend
            .create_feedback(&self.username, &form.title, &form.content)
            .await
            .map_err(|()| Error::Internal)
    }

    pub async fn update_feedback(&self, id: i64, form: FeedbackForm) -> Result<Feedback> {
        form.check().map_err(Error::Invalid)?;

        self.app
            .backend
            .update_feedback(id, &self.username, &form.title, &form.content)
            .await
            .map_err(|e| match e {
                // the owner filter didn't match, or the row's gone
                FindError::NotFound => Error::NotFound,
                FindError::Internal => Error::Internal,
            })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use sqlx::query;

    use crate::backend;

    async fn create_app() -> Arc<App> {
        let db = backend::test::create_db().await;

        Arc::new(App::new(
            Backend(db),
            Hasher::fast(),
            SessionConfig::new(false, 14),
        ))
    }

    fn registration(username: &str, email: &str) -> Registration {
        Registration {
            username: username.into(),
            password: "pw1".into(),
            email: email.into(),
            first_name: "A".into(),
            last_name: "L".into(),
        }
    }

    fn login(username: &str, password: &str) -> Login {
        Login {
            username: username.into(),
            password: password.into(),
        }
    }

    fn feedback_form(title: &str, content: &str) -> FeedbackForm {
        FeedbackForm {
            title: title.into(),
            content: content.into(),
        }
    }

    async fn count(app: &App, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&app.backend.0)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn register_then_login() {
        let app = create_app().await;

        let registered = app
            .register(registration("alice", "a@x.com"), None)
            .await
            .unwrap();
        assert_eq!(registered.username(), "alice");

        let user = app.backend.find_user("alice").await.unwrap();
        assert_ne!(user.pwhash, "pw1");
        assert!(app.hasher.verify("pw1", &user.pwhash));

        let authed = app.login(login("alice", "pw1"), None).await.unwrap();
        assert_eq!(authed.username(), "alice");

        let current = app.authenticate(Some(*authed.session_id())).await.unwrap();
        assert_eq!(current.username(), "alice");
    }

    #[tokio::test]
    async fn bad_credentials() {
        let app = create_app().await;
        app.register(registration("alice", "a@x.com"), None)
            .await
            .unwrap();
        let sessions = count(&app, "sessions").await;

        assert!(matches!(
            app.check_credentials("alice", "pw2").await,
            Ok(Verdict::WrongPassword)
        ));
        assert!(matches!(
            app.check_credentials("bob", "pw1").await,
            Ok(Verdict::NoSuchUser)
        ));
        assert!(matches!(
            app.check_credentials("alice", "pw1").await,
            Ok(Verdict::Accepted(User { ref username, .. })) if username == "alice"
        ));

        assert!(matches!(
            app.login(login("alice", "pw2"), None).await,
            Err(Error::BadCredentials)
        ));
        assert!(matches!(
            app.login(login("bob", "pw1"), None).await,
            Err(Error::BadCredentials)
        ));
        assert_eq!(count(&app, "sessions").await, sessions);
    }

    #[tokio::test]
    async fn invalid_forms_change_nothing() {
        let app = create_app().await;

        let Err(Error::Invalid(errors)) = app.register(registration("alice", "nope"), None).await
        else {
            panic!("expected invalid form");
        };
        assert_eq!(errors.messages(), ["Email address is invalid"]);
        assert_eq!(count(&app, "users").await, 0);

        assert!(matches!(
            app.login(login("", "pw"), None).await,
            Err(Error::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn duplicate_registration() {
        let app = create_app().await;
        app.register(registration("alice", "a@x.com"), None)
            .await
            .unwrap();

        assert!(matches!(
            app.register(registration("alice", "b@x.com"), None).await,
            Err(Error::DuplicateKey(UniqueField::Username))
        ));
        assert!(matches!(
            app.register(registration("bob", "a@x.com"), None).await,
            Err(Error::DuplicateKey(UniqueField::Email))
        ));
        assert_eq!(count(&app, "users").await, 1);
    }

    #[tokio::test]
    async fn racing_registrations() {
        let app = create_app().await;

        let (a, b) = tokio::join!(
            app.register(registration("alice", "a@x.com"), None),
            app.register(registration("alice", "a2@x.com"), None),
        );

        let oks = [a.is_ok(), b.is_ok()].into_iter().filter(|&ok| ok).count();
        assert_eq!(oks, 1);
        assert!(matches!(
            a.err().or(b.err()),
            Some(Error::DuplicateKey(UniqueField::Username))
        ));
        assert_eq!(count(&app, "users").await, 1);
    }

    #[tokio::test]
    async fn anonymous_and_unknown_sessions() {
        let app = create_app().await;

        assert!(matches!(app.authenticate(None).await, Err(Error::Unauthorized)));
        assert!(matches!(
            app.authenticate(Some(SessionId::new())).await,
            Err(Error::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn guard_matches_owner() {
        let app = create_app().await;
        let alice = app
            .register(registration("alice", "a@x.com"), None)
            .await
            .unwrap();
        let session = Some(*alice.session_id());

        let authed = app.authenticate(session).await.unwrap();
        assert!(matches!(authed.with_user("bob"), Err(Error::Unauthorized)));

        let authed = app.authenticate(session).await.unwrap();
        let owner = authed.with_user("alice").unwrap();
        assert_eq!(owner.user().await.unwrap().email, "a@x.com");
    }

    #[tokio::test]
    async fn feedback_only_editable_by_owner() {
        let app = create_app().await;
        let alice = app
            .register(registration("alice", "a@x.com"), None)
            .await
            .unwrap();
        let bob = app
            .register(registration("bob", "b@x.com"), None)
            .await
            .unwrap();

        let fb = alice
            .add_feedback(feedback_form("title", "content"))
            .await
            .unwrap();
        assert_eq!(alice.feedback().await.unwrap(), vec![fb.clone()]);
        assert_eq!(bob.feedback().await.unwrap(), vec![]);

        // bob can't get an owning handle on alice's feedback
        let bob_authed = app.authenticate(Some(*bob.session_id())).await.unwrap();
        assert!(matches!(
            bob_authed.with_feedback(fb.id).await,
            Err(Error::Unauthorized)
        ));
        // and even if he tries it on his own handle, the store won't have it
        assert!(matches!(
            bob.update_feedback(fb.id, feedback_form("hacked", "hacked")).await,
            Err(Error::NotFound)
        ));
        assert_eq!(app.backend.find_feedback(fb.id).await.unwrap(), fb);

        let alice_authed = app.authenticate(Some(*alice.session_id())).await.unwrap();
        let (owner, loaded) = alice_authed.with_feedback(fb.id).await.unwrap();
        assert_eq!(loaded, fb);

        let updated = owner
            .update_feedback(fb.id, feedback_form("new", "newer"))
            .await
            .unwrap();
        assert_eq!(app.backend.find_feedback(fb.id).await.unwrap(), updated);
        assert_eq!(updated.title, "new");
        assert_eq!(updated.content, "newer");
    }

    #[tokio::test]
    async fn missing_feedback() {
        let app = create_app().await;
        let alice = app
            .register(registration("alice", "a@x.com"), None)
            .await
            .unwrap();

        let authed = app.authenticate(Some(*alice.session_id())).await.unwrap();
        assert!(matches!(
            authed.with_feedback(7).await,
            Err(Error::NotFound)
        ));
    }

    #[tokio::test]
    async fn invalid_feedback_not_stored() {
        let app = create_app().await;
        let alice = app
            .register(registration("alice", "a@x.com"), None)
            .await
            .unwrap();

        assert!(matches!(
            alice.add_feedback(feedback_form("", "content")).await,
            Err(Error::Invalid(_))
        ));
        assert_eq!(count(&app, "feedback").await, 0);
    }

    #[tokio::test]
    async fn login_replaces_client_session() {
        let app = create_app().await;
        let first = app
            .register(registration("alice", "a@x.com"), None)
            .await
            .unwrap();
        let first_session = *first.session_id();

        let second = app
            .login(login("alice", "pw1"), Some(first_session))
            .await
            .unwrap();

        assert_ne!(*second.session_id(), first_session);
        assert!(matches!(
            app.authenticate(Some(first_session)).await,
            Err(Error::Unauthorized)
        ));
        assert!(app.authenticate(Some(*second.session_id())).await.is_ok());
    }

    #[tokio::test]
    async fn logout() {
        let app = create_app().await;
        let alice = app
            .register(registration("alice", "a@x.com"), None)
            .await
            .unwrap();
        let session = Some(*alice.session_id());

        app.logout(session).await.unwrap();
        assert!(matches!(app.authenticate(session).await, Err(Error::Unauthorized)));

        // nothing to clear is fine
        app.logout(session).await.unwrap();
        app.logout(None).await.unwrap();
    }

    #[tokio::test]
    async fn expired_session() {
        let app = create_app().await;
        let alice = app
            .register(registration("alice", "a@x.com"), None)
            .await
            .unwrap();
        let session = *alice.session_id();

        query("UPDATE sessions SET created = 1")
            .execute(&app.backend.0)
            .await
            .unwrap();

        assert!(matches!(
            app.authenticate(Some(session)).await,
            Err(Error::Unauthorized)
        ));
        assert_eq!(count(&app, "sessions").await, 0);
    }
}
