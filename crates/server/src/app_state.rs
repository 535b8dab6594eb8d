use std::sync::Arc;

use sheets_integration::SpreadsheetAppender;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) sheets: Arc<dyn SpreadsheetAppender>,
}
