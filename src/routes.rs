use std::sync::Arc;

use askama::Template;
use log::error;
use serde::de::DeserializeOwned;
use warp::{
    http::{StatusCode, Uri},
    reply::Response,
    Filter, Rejection, Reply,
};

use crate::app::{App, Authed, Error};
use crate::feedback::{Feedback, FeedbackForm};
use crate::pages::{FeedbackPage, LoginPage, ProfilePage, RegisterPage};
use crate::session::{SessionId, COOKIE_NAME};
use crate::user::{Login, Registration};

const FORM_LIMIT: u64 = 64 * 1024;

pub fn routes(app: Arc<App>) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let app = warp::any().map(move || Arc::clone(&app));

    // a cookie we can't parse is as good as no cookie
    let session = warp::cookie::optional::<String>(COOKIE_NAME)
        .map(|cookie: Option<String>| cookie.and_then(|c| c.parse::<SessionId>().ok()));

    let home = warp::path::end().and(warp::get()).and_then(home);

    let register = {
        let show = warp::path!("register")
            .and(warp::get())
            .and_then(register_form);

        let submit = warp::path!("register")
            .and(warp::post())
            .and(app.clone())
            .and(session.clone())
            .and(form::<Registration>())
            .and_then(register);

        show.or(submit).unify()
    };

    let login = {
        let show = warp::path!("login").and(warp::get()).and_then(login_form);

        let submit = warp::path!("login")
            .and(warp::post())
            .and(app.clone())
            .and(session.clone())
            .and(form::<Login>())
            .and_then(login);

        show.or(submit).unify()
    };

    let logout = warp::path!("logout")
        .and(warp::get())
        .and(app.clone())
        .and(session.clone())
        .and_then(logout);

    // the session is checked before any body is read
    let authed = app.and(session).and_then(authenticate);

    let profile = warp::path!("users" / String)
        .and(warp::get())
        .and(authed.clone())
        .and_then(owner_of_profile)
        .and_then(profile);

    let add_feedback = {
        let show = warp::path!("users" / String / "feedback" / "add")
            .and(warp::get())
            .and(authed.clone())
            .and_then(owner_of_profile)
            .and_then(add_feedback_form);

        let submit = warp::path!("users" / String / "feedback" / "add")
            .and(warp::post())
            .and(authed.clone())
            .and_then(owner_of_profile)
            .and(form::<FeedbackForm>())
            .and_then(add_feedback);

        show.or(submit).unify()
    };

    let update_feedback = {
        let show = warp::path!("feedbacks" / i64 / "update")
            .and(warp::get())
            .and(authed.clone())
            .and_then(owner_of_feedback)
            .untuple_one()
            .and_then(update_feedback_form);

        let submit = warp::path!("feedbacks" / i64 / "update")
            .and(warp::post())
            .and(authed)
            .and_then(owner_of_feedback)
            .untuple_one()
            .and(form::<FeedbackForm>())
            .and_then(update_feedback);

        show.or(submit).unify()
    };

    home.or(register)
        .unify()
        .or(login)
        .unify()
        .or(logout)
        .unify()
        .or(profile)
        .unify()
        .or(add_feedback)
        .unify()
        .or(update_feedback)
        .unify()
        .recover(recover)
        .unify()
}

async fn authenticate(app: Arc<App>, session_id: Option<SessionId>) -> Result<Authed, Rejection> {
    Ok(app.authenticate(session_id).await?)
}

async fn owner_of_profile(username: String, authed: Authed) -> Result<Authed<true>, Rejection> {
    Ok(authed.with_user(&username)?)
}

async fn owner_of_feedback(
    id: i64,
    authed: Authed,
) -> Result<(Authed<true>, Feedback), Rejection> {
    Ok(authed.with_feedback(id).await?)
}

fn form<T>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone
where
    T: DeserializeOwned + Send,
{
    warp::body::content_length_limit(FORM_LIMIT).and(warp::body::form())
}

async fn home() -> Result<Response, Rejection> {
    Ok(redirect(Uri::from_static("/register")))
}

async fn register_form() -> Result<Response, Rejection> {
    render(RegisterPage {
        form: &Registration::default(),
        errors: &[],
    })
}

async fn register(
    app: Arc<App>,
    session_id: Option<SessionId>,
    form: Registration,
) -> Result<Response, Rejection> {
    let errors = match app.register(form.clone(), session_id).await {
        Ok(authed) => return logged_in(&app, &authed),
        Err(Error::Invalid(errors)) => errors.messages().to_vec(),
        Err(Error::DuplicateKey(field)) => vec![field.message().to_string()],
        Err(e) => return Err(e.into()),
    };

    render(RegisterPage {
        form: &form,
        errors: &errors,
    })
}

async fn login_form() -> Result<Response, Rejection> {
    render(LoginPage {
        form: &Login::default(),
        errors: &[],
    })
}

async fn login(
    app: Arc<App>,
    session_id: Option<SessionId>,
    form: Login,
) -> Result<Response, Rejection> {
    let errors = match app.login(form.clone(), session_id).await {
        Ok(authed) => return logged_in(&app, &authed),
        Err(Error::Invalid(errors)) => errors.messages().to_vec(),
        Err(Error::BadCredentials) => vec!["Invalid username or password".to_string()],
        Err(e) => return Err(e.into()),
    };

    render(LoginPage {
        form: &form,
        errors: &errors,
    })
}

async fn logout(app: Arc<App>, session_id: Option<SessionId>) -> Result<Response, Rejection> {
    app.logout(session_id).await?;

    Ok(with_cookie(
        redirect(Uri::from_static("/")),
        app.sessions().removal_cookie(),
    ))
}

async fn profile(authed: Authed<true>) -> Result<Response, Rejection> {
    let user = authed.user().await?;
    let feedback = authed.feedback().await?;

    render(ProfilePage {
        user: &user,
        feedback: &feedback,
    })
}

async fn add_feedback_form(authed: Authed<true>) -> Result<Response, Rejection> {
    render(FeedbackPage {
        username: authed.username(),
        id: None,
        form: &FeedbackForm::default(),
        errors: &[],
    })
}

async fn add_feedback(authed: Authed<true>, form: FeedbackForm) -> Result<Response, Rejection> {
    match authed.add_feedback(form.clone()).await {
        Ok(_) => Ok(redirect(profile_uri(authed.username())?)),
        Err(Error::Invalid(errors)) => render(FeedbackPage {
            username: authed.username(),
            id: None,
            form: &form,
            errors: errors.messages(),
        }),
        Err(e) => Err(e.into()),
    }
}

async fn update_feedback_form(
    authed: Authed<true>,
    feedback: Feedback,
) -> Result<Response, Rejection> {
    render(FeedbackPage {
        username: authed.username(),
        id: Some(feedback.id),
        form: &FeedbackForm::from(&feedback),
        errors: &[],
    })
}

async fn update_feedback(
    authed: Authed<true>,
    feedback: Feedback,
    form: FeedbackForm,
) -> Result<Response, Rejection> {
    match authed.update_feedback(feedback.id, form.clone()).await {
        Ok(_) => Ok(redirect(profile_uri(authed.username())?)),
        Err(Error::Invalid(errors)) => render(FeedbackPage {
            username: authed.username(),
            id: Some(feedback.id),
            form: &form,
            errors: errors.messages(),
        }),
        Err(e) => Err(e.into()),
    }
}

async fn recover(err: Rejection) -> Result<Response, Rejection> {
    let Some(e) = err.find::<Error>() else {
        return Err(err);
    };

    Ok(match e {
        // no session, or not the owner's: same answer either way
        Error::Unauthorized => redirect(Uri::from_static("/login")),
        Error::NotFound => StatusCode::NOT_FOUND.into_response(),
        Error::Internal => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        // form errors are rendered by the handler that hit them
        Error::BadCredentials | Error::DuplicateKey(_) | Error::Invalid(_) => {
            error!("unhandled error reached response: {e:?}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    })
}

fn logged_in(app: &App, authed: &Authed<true>) -> Result<Response, Rejection> {
    let uri = profile_uri(authed.username())?;

    Ok(with_cookie(
        redirect(uri),
        app.sessions().cookie(authed.session_id()),
    ))
}

fn profile_uri(username: &str) -> Result<Uri, Error> {
    format!("/users/{username}").parse().map_err(|e| {
        error!("can't build profile uri for {username:?}: {e}");
        Error::Internal
    })
}

fn redirect(uri: Uri) -> Response {
    warp::redirect::see_other(uri).into_response()
}

fn with_cookie(response: Response, cookie: String) -> Response {
    warp::reply::with_header(response, "set-cookie", cookie).into_response()
}

fn render(page: impl Template) -> Result<Response, Rejection> {
    let html = page.render().map_err(|e| {
        error!("couldn't render page: {e}");
        Error::Internal
    })?;

    Ok(warp::reply::html(html).into_response())
}
