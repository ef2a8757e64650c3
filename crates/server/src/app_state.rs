use reader::ReaderContext;

use crate::auth::AuthConfig;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) reader: ReaderContext,
    pub(crate) auth: AuthConfig,
    pub(crate) admin_emails: Vec<String>,
}
