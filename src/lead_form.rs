//! Lead form controller.
//!
//! Wraps the pipeline with the form's submission state machine
//! (`Idle -> Submitting -> {Succeeded, Failed}`) and renders outcomes through
//! a [`FormView`].

use crate::errors::{StoreError, SubmitError};
use crate::i18n::{t, Language, MessageKey};
use crate::models::Apartment;
use crate::pipeline::{LeadPipeline, LeadRequest, Submission};
use crate::validation::FormField;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Delay between the success message and closing the form.
pub const DEFAULT_CLOSE_DELAY: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormState {
    Idle,
    Submitting,
    Succeeded,
    Failed,
}

/// Rendering side of the form. Failure paths never reset field contents.
pub trait FormView: Send + Sync + 'static {
    /// Apartment summary shown when the form opens.
    fn show_apartment(&self, summary: &[(String, String)]);
    /// Clears field error markers and the message area.
    fn clear_errors(&self);
    fn mark_invalid(&self, field: FormField, message: &str);
    fn set_submitting(&self, submitting: bool, label: &str);
    fn show_success(&self, message: &str);
    fn show_error(&self, message: &str);
    fn close(&self);
}

/// What a submit trigger resulted in.
#[derive(Debug)]
pub enum SubmitOutcome {
    /// Another submission of this form was still in flight.
    Ignored,
    Succeeded(Submission),
    Failed(SubmitError),
}

/// Message shown for a failed submission.
pub fn failure_message_key(err: &SubmitError) -> MessageKey {
    match err {
        SubmitError::Validation(_) => MessageKey::ErrorRequiredFields,
        SubmitError::StoreNotConfigured => MessageKey::ErrorConfig,
        SubmitError::StoreTimeout => MessageKey::ErrorTimeout,
        SubmitError::StoreRejected(StoreError::ConstraintViolation(_)) => {
            MessageKey::ErrorRequiredFields
        }
        SubmitError::StoreRejected(StoreError::PermissionDenied(_)) => MessageKey::ErrorPermission,
        SubmitError::StoreRejected(_) => MessageKey::ErrorGeneral,
    }
}

pub struct LeadForm<V: FormView> {
    pipeline: Arc<LeadPipeline>,
    view: Arc<V>,
    state: Mutex<FormState>,
    close_delay: Duration,
}

impl<V: FormView> LeadForm<V> {
    pub fn new(pipeline: Arc<LeadPipeline>, view: Arc<V>) -> Self {
        Self {
            pipeline,
            view,
            state: Mutex::new(FormState::Idle),
            close_delay: DEFAULT_CLOSE_DELAY,
        }
    }

    pub fn with_close_delay(mut self, close_delay: Duration) -> Self {
        self.close_delay = close_delay;
        self
    }

    pub fn state(&self) -> FormState {
        *self.lock_state()
    }

    pub fn view(&self) -> &Arc<V> {
        &self.view
    }

    /// Shows the apartment the visitor is asking about.
    pub fn open(&self, apartment: &Apartment, language: Language) {
        let mut summary = Vec::new();
        if let Some(id) = &apartment.id {
            summary.push((t(language, MessageKey::ApartmentLabel).to_string(), id.clone()));
        }
        summary.extend(apartment.data.summary(language));

        self.view.clear_errors();
        self.view.show_apartment(&summary);
    }

    /// Handles one submit trigger. A trigger arriving while a submission is
    /// in flight is ignored.
    pub async fn submit(&self, request: &LeadRequest, language: Language) -> SubmitOutcome {
        let Some(mut guard) = self.begin(language) else {
            tracing::debug!("Submit ignored, form already submitting");
            return SubmitOutcome::Ignored;
        };

        self.view.clear_errors();
        self.view
            .set_submitting(true, t(language, MessageKey::Submitting));

        match self.pipeline.submit(request).await {
            Ok(submission) => {
                guard.finish(FormState::Succeeded);
                self.view
                    .show_success(&format!("✅ {}", t(language, MessageKey::Success)));
                self.schedule_close();
                SubmitOutcome::Succeeded(submission)
            }
            Err(err) => {
                guard.finish(FormState::Failed);
                match &err {
                    SubmitError::Validation(errors) => {
                        for field in &errors.fields {
                            self.view
                                .mark_invalid(*field, t(language, field.error_key()));
                        }
                    }
                    other => {
                        tracing::error!("❌ Error submitting lead: {}", other);
                        self.view.show_error(&format!(
                            "❌ {}",
                            t(language, failure_message_key(other))
                        ));
                    }
                }
                SubmitOutcome::Failed(err)
            }
        }
    }

    fn begin(&self, language: Language) -> Option<SubmittingGuard<'_, V>> {
        let mut state = self.lock_state();
        if *state == FormState::Submitting {
            return None;
        }
        *state = FormState::Submitting;

        Some(SubmittingGuard {
            form: self,
            language,
            next: FormState::Failed,
        })
    }

    fn schedule_close(&self) {
        let view = Arc::clone(&self.view);
        let delay = self.close_delay;

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            view.close();
        });
    }

    fn lock_state(&self) -> MutexGuard<'_, FormState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Leaves `Submitting` when dropped, on every exit path including a dropped
/// (cancelled) submit future. Defaults to `Failed`.
struct SubmittingGuard<'a, V: FormView> {
    form: &'a LeadForm<V>,
    language: Language,
    next: FormState,
}

impl<V: FormView> SubmittingGuard<'_, V> {
    fn finish(&mut self, next: FormState) {
        self.next = next;
    }
}

impl<V: FormView> Drop for SubmittingGuard<'_, V> {
    fn drop(&mut self) {
        *self.form.lock_state() = self.next;
        self.form
            .view
            .set_submitting(false, t(self.language, MessageKey::Submit));
    }
}

/// View for forms driven over HTTP: the response carries the rendering, so
/// this only traces what the browser is told.
#[derive(Debug, Default)]
pub struct TracingView;

impl FormView for TracingView {
    fn show_apartment(&self, summary: &[(String, String)]) {
        tracing::debug!("Form opened with {} apartment fields", summary.len());
    }

    fn clear_errors(&self) {}

    fn mark_invalid(&self, field: FormField, _message: &str) {
        tracing::debug!("Field invalid: {}", field.as_str());
    }

    fn set_submitting(&self, _submitting: bool, _label: &str) {}

    fn show_success(&self, message: &str) {
        tracing::debug!("Form success: {}", message);
    }

    fn show_error(&self, message: &str) {
        tracing::debug!("Form error: {}", message);
    }

    fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_messages_by_category() {
        assert_eq!(
            failure_message_key(&SubmitError::StoreNotConfigured),
            MessageKey::ErrorConfig
        );
        assert_eq!(
            failure_message_key(&SubmitError::StoreTimeout),
            MessageKey::ErrorTimeout
        );
        assert_eq!(
            failure_message_key(&SubmitError::StoreRejected(
                StoreError::ConstraintViolation("null value".into())
            )),
            MessageKey::ErrorRequiredFields
        );
        assert_eq!(
            failure_message_key(&SubmitError::StoreRejected(StoreError::PermissionDenied(
                "row-level security".into()
            ))),
            MessageKey::ErrorPermission
        );
        assert_eq!(
            failure_message_key(&SubmitError::StoreRejected(StoreError::Other("?".into()))),
            MessageKey::ErrorGeneral
        );
    }
}
