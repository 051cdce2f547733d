/// Account handlers: signup, login, logout, password change and reset
use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;

use super::{anonymous_context, base_context};
use crate::error::{AppError, Result};
use crate::forms::{
    FormErrors, LoginForm, PasswordChangeForm, PasswordResetForm, SetPasswordForm, SignupForm,
};
use crate::middleware::permissions::redirect;
use crate::middleware::{AuthenticatedUser, CurrentUser};
use crate::models::User;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

/// Only same-site absolute paths are followed after login
pub fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => {
            path
        }
        _ => "/",
    }
}

fn render_signup(
    state: &AppState,
    user: &CurrentUser,
    form: &SignupForm,
    errors: &FormErrors,
) -> Result<HttpResponse> {
    let mut context = base_context(user);
    context.insert("form", form);
    context.insert("errors", errors);
    state.templates.page("users/signup.html", &context)
}

/// GET /auth/signup/
pub async fn signup_form(state: web::Data<AppState>, user: CurrentUser) -> Result<HttpResponse> {
    render_signup(&state, &user, &SignupForm::default(), &FormErrors::new())
}

/// POST /auth/signup/
pub async fn signup(
    state: web::Data<AppState>,
    user: CurrentUser,
    form: web::Form<SignupForm>,
) -> Result<HttpResponse> {
    match state.accounts.signup(&form).await? {
        Ok(_) => Ok(redirect("/")),
        Err(errors) => render_signup(&state, &user, &form, &errors),
    }
}

fn render_login(state: &AppState, form: &LoginForm, errors: &FormErrors) -> Result<HttpResponse> {
    let mut context = anonymous_context();
    context.insert("form", form);
    context.insert("errors", errors);
    context.insert("next", &form.next);
    state.templates.page("users/login.html", &context)
}

/// GET /auth/login/
pub async fn login_form(
    state: web::Data<AppState>,
    query: web::Query<NextQuery>,
) -> Result<HttpResponse> {
    let form = LoginForm {
        next: query.next.clone().unwrap_or_default(),
        ..Default::default()
    };
    render_login(&state, &form, &FormErrors::new())
}

/// Redirect to `location` carrying a fresh session for `user`
fn redirect_with_session(state: &AppState, user: &User, location: &str) -> Result<HttpResponse> {
    let token = state.sessions.issue(user)?;
    let mut resp = redirect(location);
    resp.add_cookie(&state.sessions.cookie(token))
        .map_err(|e| AppError::Internal(format!("Failed to set cookie: {}", e)))?;
    Ok(resp)
}

/// POST /auth/login/ - sets the session cookie
pub async fn login(state: web::Data<AppState>, form: web::Form<LoginForm>) -> Result<HttpResponse> {
    match state.accounts.login(&form).await? {
        Ok(user) => {
            let target = safe_next(Some(form.next.as_str()).filter(|n| !n.is_empty()));
            redirect_with_session(&state, &user, target)
        }
        Err(errors) => render_login(&state, &form, &errors),
    }
}

/// GET|POST /auth/logout/ - clears the session cookie
pub async fn logout(state: web::Data<AppState>) -> Result<HttpResponse> {
    let mut resp = state
        .templates
        .page("users/logged_out.html", &anonymous_context())?;
    resp.add_removal_cookie(&state.sessions.removal_cookie())
        .map_err(|e| AppError::Internal(format!("Failed to clear cookie: {}", e)))?;
    Ok(resp)
}

fn render_password_change(
    state: &AppState,
    user: AuthenticatedUser,
    errors: &FormErrors,
) -> Result<HttpResponse> {
    let mut context = base_context(&CurrentUser(Some(user.0)));
    context.insert("errors", errors);
    state.templates.page("users/password_change.html", &context)
}

/// GET /auth/password_change/
pub async fn password_change_form(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
) -> Result<HttpResponse> {
    render_password_change(&state, user, &FormErrors::new())
}

/// POST /auth/password_change/ - other sessions end, this one is re-issued
pub async fn password_change(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    form: web::Form<PasswordChangeForm>,
) -> Result<HttpResponse> {
    match state.accounts.change_password(&user.0, &form).await? {
        Ok(updated) => redirect_with_session(&state, &updated, "/auth/password_change/done/"),
        Err(errors) => render_password_change(&state, user, &errors),
    }
}

/// GET /auth/password_change/done/
pub async fn password_change_done(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
) -> Result<HttpResponse> {
    let context = base_context(&CurrentUser(Some(user.0)));
    state.templates.page("users/password_change_done.html", &context)
}

fn render_password_reset(
    state: &AppState,
    user: &CurrentUser,
    form: &PasswordResetForm,
    errors: &FormErrors,
) -> Result<HttpResponse> {
    let mut context = base_context(user);
    context.insert("form", form);
    context.insert("errors", errors);
    state.templates.page("users/password_reset_form.html", &context)
}

/// GET /auth/password_reset/
pub async fn password_reset_form(
    state: web::Data<AppState>,
    user: CurrentUser,
) -> Result<HttpResponse> {
    render_password_reset(&state, &user, &PasswordResetForm::default(), &FormErrors::new())
}

/// POST /auth/password_reset/ - mails a link to every account with that
/// address; unknown addresses land on the same page
pub async fn password_reset(
    state: web::Data<AppState>,
    user: CurrentUser,
    req: HttpRequest,
    form: web::Form<PasswordResetForm>,
) -> Result<HttpResponse> {
    let errors = FormErrors::check(&*form);
    if !errors.is_empty() {
        return render_password_reset(&state, &user, &form, &errors);
    }

    let site = {
        let info = req.connection_info();
        format!("{}://{}", info.scheme(), info.host())
    };
    for account in state.accounts.users_for_reset(&form.email).await? {
        let token = state.sessions.issue_reset(&account)?;
        let link = format!("{}/auth/reset/{}/", site, token);
        state
            .email
            .send_password_reset(&account.email, &account.username, &link)
            .await?;
        tracing::info!(user_id = account.id, "password reset link sent");
    }
    Ok(redirect("/auth/password_reset/done/"))
}

/// GET /auth/password_reset/done/
pub async fn password_reset_done(
    state: web::Data<AppState>,
    user: CurrentUser,
) -> Result<HttpResponse> {
    state
        .templates
        .page("users/password_reset_done.html", &base_context(&user))
}

/// Account a reset link still works for
async fn reset_target(state: &AppState, token: &str) -> Result<Option<User>> {
    let Some(subject) = state.sessions.verify_reset(token) else {
        return Ok(None);
    };
    let user = state.repo.find_user_by_id(subject.user_id).await?;
    Ok(user.filter(|user| state.sessions.matches(&subject, user)))
}

fn render_password_reset_confirm(
    state: &AppState,
    user: &CurrentUser,
    token: &str,
    valid: bool,
    errors: &FormErrors,
) -> Result<HttpResponse> {
    let mut context = base_context(user);
    context.insert("validlink", &valid);
    context.insert("token", token);
    context.insert("errors", errors);
    state.templates.page("users/password_reset_confirm.html", &context)
}

/// GET /auth/reset/{token}/
pub async fn password_reset_confirm_form(
    state: web::Data<AppState>,
    user: CurrentUser,
    token: web::Path<String>,
) -> Result<HttpResponse> {
    let valid = reset_target(&state, &token).await?.is_some();
    render_password_reset_confirm(&state, &user, &token, valid, &FormErrors::new())
}

/// POST /auth/reset/{token}/ - the link stops working once the password changes
pub async fn password_reset_confirm(
    state: web::Data<AppState>,
    user: CurrentUser,
    token: web::Path<String>,
    form: web::Form<SetPasswordForm>,
) -> Result<HttpResponse> {
    let Some(account) = reset_target(&state, &token).await? else {
        return render_password_reset_confirm(&state, &user, &token, false, &FormErrors::new());
    };

    match state.accounts.set_password(&account, &form).await? {
        Ok(_) => Ok(redirect("/auth/reset/done/")),
        Err(errors) => render_password_reset_confirm(&state, &user, &token, true, &errors),
    }
}

/// GET /auth/reset/done/
pub async fn password_reset_complete(
    state: web::Data<AppState>,
    user: CurrentUser,
) -> Result<HttpResponse> {
    state
        .templates
        .page("users/password_reset_complete.html", &base_context(&user))
}
