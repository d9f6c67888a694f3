use crate::{
    auth::RequestContext,
    errors::ServerError,
    models::{note::ValidNote, user::User},
    order,
    store::{NoteStore, UserStore},
};

pub const DEMO_EMAIL: &str = "demo@example.com";
pub const DEMO_PASSWORD: &str = "demo123";

const DEMO_NOTES: [(&str, &str); 3] = [
    (
        "Welcome to Notes App",
        "This is your first note! You can edit it, delete it, or create new ones.",
    ),
    ("Shopping List", "- Milk\n- Bread\n- Eggs\n- Coffee"),
    (
        "Meeting Notes",
        "Team standup at 9 AM\nDiscuss Q4 goals\nReview project timeline",
    ),
];

/// Creates the demo account and, if it has no notes yet, its demo notes.
///
/// Safe to run on every start. A run that stopped after creating the account
/// gets its notes on the next one.
pub fn demo_user(users: &dyn UserStore, notes: &dyn NoteStore) -> Result<(), ServerError> {
    let user = match users.find_by_email(DEMO_EMAIL)? {
        Some(user) => user,
        None => {
            let user = User::new(
                DEMO_EMAIL.to_string(),
                Some("Demo User".to_string()),
                DEMO_PASSWORD,
            )?;
            users.insert_user(&user)?;
            log::info!("created demo user {DEMO_EMAIL}");
            user
        }
    };

    let ctx = RequestContext::new(user.id);
    if !notes.list_by_user(ctx.user_id())?.is_empty() {
        log::info!("demo notes already present, skipping seed");
        return Ok(());
    }

    let contents: Vec<ValidNote> = DEMO_NOTES
        .iter()
        .map(|(title, content)| ValidNote {
            title: title.to_string(),
            content: content.to_string(),
        })
        .collect();
    order::create_all(notes, &ctx, &contents)?;

    log::info!("seeded {} demo notes", contents.len());
    Ok(())
}
