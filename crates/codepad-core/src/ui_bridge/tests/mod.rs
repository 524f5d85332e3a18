use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::ui_bridge::{HeadlessUi, InstallUi, LoaderGuard};

#[derive(Default)]
struct CountingUi {
    shown: AtomicUsize,
    destroyed: AtomicUsize,
    messages: Mutex<Vec<String>>,
}

#[async_trait]
impl InstallUi for CountingUi {
    async fn confirm(&self, _title: &str, _message: &str) -> bool {
        true
    }

    fn show_loader(&self, _title: &str, _message: &str) {
        self.shown.fetch_add(1, Ordering::SeqCst);
    }

    fn set_loader_message(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }

    fn destroy_loader(&self) {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
    }

    fn alert(&self, _title: &str, _message: &str) {}
}

#[test]
fn test_loader_guard_destroys_on_drop() {
    let ui = Arc::new(CountingUi::default());
    {
        let guard = LoaderGuard::show(ui.clone(), "Installing", "Loading...");
        guard.set_message("Loading... 50%");
        assert_eq!(ui.shown.load(Ordering::SeqCst), 1);
        assert_eq!(ui.destroyed.load(Ordering::SeqCst), 0);
    }
    assert_eq!(ui.destroyed.load(Ordering::SeqCst), 1);
    assert_eq!(ui.messages.lock().unwrap().clone(), vec!["Loading... 50%".to_string()]);
}

#[test]
fn test_loader_guard_destroys_on_early_return() {
    fn fails(ui: Arc<dyn InstallUi>) -> Result<(), String> {
        let _guard = LoaderGuard::show(ui, "Installing", "Loading...");
        Err("download failed".to_string())
    }

    let ui = Arc::new(CountingUi::default());
    assert!(fails(ui.clone()).is_err());
    assert_eq!(ui.destroyed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_headless_ui_answers_with_configured_value() {
    assert!(HeadlessUi { auto_confirm: true }.confirm("Dependencies", "install?").await);
    assert!(!HeadlessUi { auto_confirm: false }.confirm("Dependencies", "install?").await);
}
