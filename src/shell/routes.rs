use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Home,
    About,
    UserInfo,
    Error,
}

impl Page {
    /// The navigation entry highlighted while this page is shown.
    pub fn menu_item(self) -> Option<&'static str> {
        match self {
            Page::Home => Some("home"),
            Page::About => Some("about"),
            Page::UserInfo => Some("secure"),
            Page::Error => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPattern {
    Exact(String),
    /// Matches the path itself and anything below it, segment by segment.
    Prefix(String),
    Wildcard,
}

impl PathPattern {
    pub fn matches(&self, path: &str) -> bool {
        let path = normalize(path);
        match self {
            PathPattern::Exact(p) => path == p.as_str(),
            PathPattern::Prefix(p) if p == "/" => true,
            PathPattern::Prefix(p) => path
                .strip_prefix(p.as_str())
                .map_or(false, |rest| rest.is_empty() || rest.starts_with('/')),
            PathPattern::Wildcard => true,
        }
    }
}

fn normalize(path: &str) -> &str {
    match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    }
}

/// What a route renders, and whether an authenticated session is required.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    pub page: Page,
    pub gated: bool,
}

impl Target {
    pub fn open(page: Page) -> Self {
        Target { page, gated: false }
    }
}

/// Wraps a page so that only authenticated sessions reach it.
pub fn require_authenticated(page: Page) -> Target {
    Target { page, gated: true }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub pattern: PathPattern,
    pub target: Target,
}

impl Route {
    pub fn new(pattern: PathPattern, target: Target) -> Self {
        Route { pattern, target }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteTableError {
    #[error("route table has no wildcard fallback")]
    MissingFallback,
    #[error("route table has {0} wildcard fallbacks")]
    DuplicateFallback(usize),
    #[error("wildcard fallback at position {0} is not the last route")]
    FallbackNotLast(usize),
}

/// Ordered routes resolved first-match-wins, closed by exactly one wildcard.
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<Route>,
    fallback: Target,
}

impl RouteTable {
    pub fn new(mut routes: Vec<Route>) -> Result<Self, RouteTableError> {
        let wildcards: Vec<usize> = routes
            .iter()
            .enumerate()
            .filter(|(_, r)| r.pattern == PathPattern::Wildcard)
            .map(|(i, _)| i)
            .collect();
        match wildcards.as_slice() {
            [] => Err(RouteTableError::MissingFallback),
            [i] if *i + 1 != routes.len() => Err(RouteTableError::FallbackNotLast(*i)),
            [_] => {
                let fallback = routes.remove(wildcards[0]).target;
                Ok(RouteTable { routes, fallback })
            }
            many => Err(RouteTableError::DuplicateFallback(many.len())),
        }
    }

    /// `/` Home, `/about` About, `/secure` gated UserInfo, everything else Error.
    pub fn standard() -> Result<Self, RouteTableError> {
        RouteTable::new(vec![
            Route::new(PathPattern::Exact("/".into()), Target::open(Page::Home)),
            Route::new(PathPattern::Prefix("/about".into()), Target::open(Page::About)),
            Route::new(
                PathPattern::Prefix("/secure".into()),
                require_authenticated(Page::UserInfo),
            ),
            Route::new(PathPattern::Wildcard, Target::open(Page::Error)),
        ])
    }

    pub fn resolve(&self, path: &str) -> Target {
        self.routes
            .iter()
            .find(|r| r.pattern.matches(path))
            .map(|r| r.target)
            .unwrap_or(self.fallback)
    }

    pub fn len(&self) -> usize {
        self.routes.len() + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}
