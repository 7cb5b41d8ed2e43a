use statly_observe::{Breadcrumb, Scope, User};

fn breadcrumb(message: String) -> Breadcrumb {
    Breadcrumb {
        message: Some(message),
        ..Default::default()
    }
}

fn user(id: &str) -> User {
    User {
        id: Some(id.into()),
        email: Some("test@example.com".into()),
        ..Default::default()
    }
}

#[test]
fn test_scope_creation() {
    let scope = Scope::new();

    assert!(scope.user().is_none());
    assert_eq!(scope.tags().count(), 0);
    assert_eq!(scope.breadcrumbs().count(), 0);
    assert_eq!(scope.max_breadcrumbs(), 100);
}

#[test]
fn test_scope_set_user() {
    let mut scope = Scope::new();
    scope.set_user(Some(user("123")));
    scope.set_user(Some(user("456")));

    let user = scope.user().unwrap();
    assert_eq!(user.id.as_deref(), Some("456"));
    assert_eq!(user.email.as_deref(), Some("test@example.com"));

    scope.set_user(None);
    assert!(scope.user().is_none());
}

#[test]
fn test_scope_max_breadcrumbs() {
    let mut scope = Scope::with_max_breadcrumbs(5);

    for i in 0..10 {
        scope.add_breadcrumb(breadcrumb(format!("Breadcrumb {}", i)));
    }

    let messages: Vec<_> = scope
        .breadcrumbs()
        .filter_map(|b| b.message.as_deref())
        .collect();
    assert_eq!(
        messages,
        vec![
            "Breadcrumb 5",
            "Breadcrumb 6",
            "Breadcrumb 7",
            "Breadcrumb 8",
            "Breadcrumb 9"
        ]
    );
}

#[test]
fn test_scope_clone_is_independent() {
    let mut scope = Scope::new();
    scope.set_user(Some(user("123")));
    scope.set_tag("key", "value");
    scope.add_breadcrumb(breadcrumb("original".into()));

    let mut cloned = scope.clone();
    assert_eq!(cloned.user().unwrap().id.as_deref(), Some("123"));
    assert_eq!(cloned.tags().collect::<Vec<_>>(), vec![("key", "value")]);

    cloned.set_user(Some(user("999")));
    cloned.set_tag("key", "changed");
    cloned.set_tag("new", "tag");
    cloned.set_extra("extra", 1.into());
    cloned.add_breadcrumb(breadcrumb("cloned".into()));

    assert_eq!(scope.user().unwrap().id.as_deref(), Some("123"));
    assert_eq!(scope.tags().collect::<Vec<_>>(), vec![("key", "value")]);
    assert_eq!(scope.extra().count(), 0);
    assert_eq!(scope.breadcrumbs().count(), 1);

    scope.clear();
    assert_eq!(cloned.breadcrumbs().count(), 2);
    assert_eq!(cloned.tags().count(), 2);
}

#[test]
fn test_scope_clear() {
    let mut scope = Scope::with_max_breadcrumbs(10);
    scope.set_user(Some(user("123")));
    scope.set_tag("key", "value");
    scope.add_breadcrumb(breadcrumb("Test".into()));

    scope.clear();

    assert!(scope.user().is_none());
    assert_eq!(scope.tags().count(), 0);
    assert_eq!(scope.breadcrumbs().count(), 0);
    assert_eq!(scope.max_breadcrumbs(), 10);
}

#[test]
fn test_clear_breadcrumbs_keeps_tags() {
    let mut scope = Scope::new();
    scope.set_tag("key", "value");
    scope.add_breadcrumb(breadcrumb("Test".into()));

    scope.clear_breadcrumbs();

    assert_eq!(scope.breadcrumbs().count(), 0);
    assert_eq!(scope.tags().count(), 1);
}
