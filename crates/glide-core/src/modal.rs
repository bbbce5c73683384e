//! Modal overlays and their results.
//!
//! The coordinator tracks which kinds of modal are open (see
//! [`Glide::open_modal`](crate::Glide::open_modal)). A message box suppresses
//! normal dispatch and drives its buttons from a [`TouchPoller`] instead; the
//! caller awaits the outcome through a [`ModalSession`].
//!
//! [`TouchPoller`]: crate::touch::TouchPoller

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use log::debug;

use crate::touch::CancelToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModalKind {
    MessageBox,
    List,
    Keyboard,
}

impl ModalKind {
    /// Whether normal touch dispatch is switched off while this modal is open.
    pub fn suppresses_dispatch(self) -> bool {
        matches!(self, ModalKind::MessageBox)
    }
}

/// Button sets offered by a message box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalButtons {
    Ok,
    OkCancel,
    AbortRetryIgnore,
    YesNo,
    YesNoCancel,
    RetryCancel,
}

impl ModalButtons {
    /// Results of the buttons, in left-to-right order.
    pub fn results(self) -> &'static [ModalResult] {
        match self {
            ModalButtons::Ok => &[ModalResult::Ok],
            ModalButtons::OkCancel => &[ModalResult::Ok, ModalResult::Cancel],
            ModalButtons::AbortRetryIgnore => &[ModalResult::Abort, ModalResult::Retry, ModalResult::Ignore],
            ModalButtons::YesNo => &[ModalResult::Yes, ModalResult::No],
            ModalButtons::YesNoCancel => &[ModalResult::Yes, ModalResult::No, ModalResult::Cancel],
            ModalButtons::RetryCancel => &[ModalResult::Retry, ModalResult::Cancel],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalResult {
    None,
    Ok,
    Cancel,
    Abort,
    Retry,
    Ignore,
    Yes,
    No,
}

impl ModalResult {
    pub fn label(self) -> &'static str {
        match self {
            ModalResult::None => "",
            ModalResult::Ok => "OK",
            ModalResult::Cancel => "Cancel",
            ModalResult::Abort => "Abort",
            ModalResult::Retry => "Retry",
            ModalResult::Ignore => "Ignore",
            ModalResult::Yes => "Yes",
            ModalResult::No => "No",
        }
    }
}

/// One showing of a modal.
///
/// Button handlers call [`complete`](Self::complete); the poll loop driving
/// the modal runs until [`cancel_token`](Self::cancel_token) fires.
pub struct ModalSession {
    result: Signal<CriticalSectionRawMutex, ModalResult>,
    cancel: CancelToken,
}

impl Default for ModalSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ModalSession {
    pub const fn new() -> Self {
        Self {
            result: Signal::new(),
            cancel: CancelToken::new(),
        }
    }

    /// Finish the session with `result` and stop its poll loop.
    pub fn complete(&self, result: ModalResult) {
        debug!(" Modal completed with {:?}", result);
        self.result.signal(result);
        self.cancel.cancel();
    }

    /// Dismiss without a choice.
    pub fn hide(&self) {
        self.complete(ModalResult::None);
    }

    pub fn is_finished(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Resolves with the result once the session completes.
    pub async fn wait(&self) -> ModalResult {
        self.result.wait().await
    }
}
