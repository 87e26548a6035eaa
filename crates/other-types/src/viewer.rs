/// Who is making the current request.
///
/// Resolved once per request from the bearer token and passed explicitly to
/// every feed, ledger and graph operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Viewer {
    #[default]
    Anonymous,
    User(i64),
}

impl Viewer {
    pub fn user_id(&self) -> Option<i64> {
        match self {
            Viewer::Anonymous => None,
            Viewer::User(id) => Some(*id),
        }
    }

    pub fn is_signed_in(&self) -> bool {
        matches!(self, Viewer::User(_))
    }
}
