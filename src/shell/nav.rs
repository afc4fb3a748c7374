use super::routes::Page;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavItem {
    pub name: &'static str,
    pub label: &'static str,
    pub href: &'static str,
    pub active: bool,
    pub right: bool,
}

const ENTRIES: [(&str, &str, &str, bool); 4] = [
    ("home", "Home", "/", false),
    ("about", "About", "/about", false),
    ("secure", "Secure", "/secure", false),
    ("logout", "Logout", "/logout", true),
];

/// The menu for a rendered page. The highlighted entry is derived from the
/// page the route table resolved to.
pub fn nav_bar(page: Page) -> Vec<NavItem> {
    let active = page.menu_item();
    ENTRIES
        .iter()
        .map(|&(name, label, href, right)| NavItem {
            name,
            label,
            href,
            active: active == Some(name),
            right,
        })
        .collect()
}
