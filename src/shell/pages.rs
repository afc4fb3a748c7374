use askama::Template;

use super::nav::{nav_bar, NavItem};
use super::routes::Page;
use crate::auth::Identity;

#[derive(Template)]
#[template(path = "home.html")]
struct HomeTemplate {
    nav: Vec<NavItem>,
    user: Option<String>,
}

#[derive(Template)]
#[template(path = "about.html")]
struct AboutTemplate {
    nav: Vec<NavItem>,
}

#[derive(Template)]
#[template(path = "user_info.html")]
struct UserInfoTemplate<'a> {
    nav: Vec<NavItem>,
    identity: &'a Identity,
    scopes: Vec<&'a str>,
}

#[derive(Template)]
#[template(path = "error.html")]
struct ErrorTemplate<'a> {
    nav: Vec<NavItem>,
    path: &'a str,
    message: &'a str,
}

/// Renders `page` inside the shell layout. `UserInfo` without an identity
/// falls back to the error page; the gate normally keeps that from happening.
pub fn render(page: Page, path: &str, identity: Option<&Identity>) -> Result<String, askama::Error> {
    match (page, identity) {
        (Page::Home, _) => HomeTemplate {
            nav: nav_bar(page),
            user: identity.map(|id| id.name().to_owned()),
        }
        .render(),
        (Page::About, _) => AboutTemplate { nav: nav_bar(page) }.render(),
        (Page::UserInfo, Some(identity)) => UserInfoTemplate {
            nav: nav_bar(page),
            identity,
            scopes: identity.scopes().collect(),
        }
        .render(),
        (Page::UserInfo, None) => render_error(path, "You need to log in to see this page"),
        (Page::Error, _) => render_error(path, "There is nothing here"),
    }
}

pub fn render_error(path: &str, message: &str) -> Result<String, askama::Error> {
    ErrorTemplate {
        nav: nav_bar(Page::Error),
        path,
        message,
    }
    .render()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn home_marks_active_entry() {
        let html = render(Page::Home, "/", None).unwrap();
        assert!(html.contains(r#"<a class="active item" href="/">Home</a>"#));
        assert!(html.contains(r#"href="/logout""#));
    }

    #[test]
    fn user_info_lists_claims() {
        let identity = Identity {
            sub: "u-1".into(),
            preferred_username: Some("alice".into()),
            scope: Some("openid profile".into()),
        };
        let html = render(Page::UserInfo, "/secure", Some(&identity)).unwrap();
        assert!(html.contains("alice"));
        assert!(html.contains("u-1"));
        assert!(html.contains("<li>profile</li>"));
    }

    #[test]
    fn user_info_needs_identity() {
        let html = render(Page::UserInfo, "/secure", None).unwrap();
        assert!(!html.contains("User Information"));
        assert!(html.contains("log in"));
    }

    #[test]
    fn error_page_escapes_path() {
        let html = render(Page::Error, "/<script>", None).unwrap();
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }
}
