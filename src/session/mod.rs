//! Application state and the three tutoring workflows.
//!
//! [`reduce`] is a pure state transition used by front ends to track a
//! generation; [`Tutor`] performs the workflows themselves.

use thiserror::Error;
use tracing::{debug, info};

use crate::access::{FeatureGate, Unrestricted};
use crate::client::{ContentGenerator, GenerationClient, GenerativeModel};
use crate::config::{ConfigError, CredentialStore};
use crate::error::{ErrorKind, GenerationError};
use crate::file::{PastedImage, UploadedFile};
use crate::models::{ContentPart, Credential, Settings};
use crate::prompts::{
    exam_prompt, image_solve_prompt, solve_prompt, ChemistryTopic, ExamConfig, ExamGrade,
    EVALUATOR_SYSTEM_INSTRUCTION, GRADING_PROMPT, PROBLEM_FILE_HEADING, SOLVE_FROM_FILE_PROMPT,
    SUBMISSION_FILE_HEADING, SYSTEM_INSTRUCTION,
};

/// Where users can get a free key.
pub const API_KEY_HELP: &str = "👉 Lấy key miễn phí tại: aistudio.google.com/apikey";

/// The three things the tutor can do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AppMode {
    /// Solve a problem
    #[default]
    Solver,
    /// Generate an exam
    ExamCreator,
    /// Grade a submission
    Grader,
}

impl AppMode {
    /// Prefix of exported file names.
    pub fn export_prefix(self) -> &'static str {
        match self {
            Self::Solver => "GiaiBai",
            Self::ExamCreator => "DeThi_HSG",
            Self::Grader => "ChamBai",
        }
    }

    /// Heading shown above a result.
    pub fn title(self) -> &'static str {
        match self {
            Self::Solver => "Lời giải bài tập",
            Self::ExamCreator => "Đề thi HSG Hóa Học",
            Self::Grader => "Kết quả chấm bài",
        }
    }

    /// The step shown while this mode is generating.
    pub fn working_step(self) -> GenerationStep {
        match self {
            Self::Solver => GenerationStep::Solving,
            Self::ExamCreator => GenerationStep::GeneratingExam,
            Self::Grader => GenerationStep::Grading,
        }
    }
}

/// Progress of the current generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GenerationStep {
    /// Nothing running
    #[default]
    Idle,
    /// Solving a problem
    Solving,
    /// Generating an exam
    GeneratingExam,
    /// Grading a submission
    Grading,
    /// Result available
    Completed,
    /// Last run failed
    Error,
}

impl GenerationStep {
    /// Whether a generation is in flight.
    pub fn is_busy(self) -> bool {
        matches!(self, Self::Solving | Self::GeneratingExam | Self::Grading)
    }
}

/// What a front end displays.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppState {
    /// Active mode
    pub mode: AppMode,
    /// Current step
    pub step: GenerationStep,
    /// Latest result text
    pub result: String,
    /// Latest error sentence
    pub error: Option<String>,
    /// Progress line while busy
    pub progress: Option<String>,
}

/// Events that move [`AppState`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Switch to another mode, clearing any result.
    SwitchMode(AppMode),
    /// A generation starts, showing `progress`.
    Start {
        /// Progress line
        progress: String,
    },
    /// The generation produced text.
    Succeeded(String),
    /// The generation failed.
    Failed {
        /// Sentence to display
        message: String,
        /// Whether the stored credential must be discarded
        clear_credential: bool,
    },
    /// Back to idle.
    Reset,
}

/// Applies `action` to `state`.
///
/// `Start` is ignored while a generation is already running.
pub fn reduce(state: AppState, action: Action) -> AppState {
    match action {
        Action::SwitchMode(mode) => AppState {
            mode,
            ..AppState::default()
        },
        Action::Start { .. } if state.step.is_busy() => state,
        Action::Start { progress } => AppState {
            step: state.mode.working_step(),
            result: String::new(),
            error: None,
            progress: Some(progress),
            ..state
        },
        Action::Succeeded(result) => AppState {
            step: GenerationStep::Completed,
            result,
            error: None,
            progress: None,
            ..state
        },
        Action::Failed { message, .. } => AppState {
            step: GenerationStep::Error,
            error: Some(message),
            progress: None,
            ..state
        },
        Action::Reset => AppState {
            mode: state.mode,
            ..AppState::default()
        },
    }
}

/// Errors from running a workflow.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No own key and the phone is not activated.
    #[error("Vui lòng đăng ký số điện thoại để sử dụng tính năng này.")]
    RegistrationRequired,
    /// No key available at all.
    #[error("Vui lòng nhập API Key.")]
    CredentialRequired,
    /// Nothing to solve.
    #[error("Vui lòng nhập đề bài, chọn file hoặc dán hình ảnh.")]
    EmptyInput,
    /// The generation itself failed.
    #[error(transparent)]
    Generation(#[from] GenerationError),
    /// A verified key could not be written.
    #[error("Không lưu được API Key: {0}")]
    Storage(#[from] ConfigError),
}

impl SessionError {
    /// Classified kind of a failed generation.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Generation(err) => err.classified().map(|c| c.kind),
            _ => None,
        }
    }

    /// Whether the user's stored key must be discarded.
    pub fn requires_new_credential(&self) -> bool {
        self.kind().is_some_and(ErrorKind::requires_new_credential)
    }

    /// The sentence to show the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Generation(err) => err.user_message(),
            other => other.to_string(),
        }
    }
}

/// Maps a failure to the action a front end dispatches.
pub fn failure_action(err: &SessionError) -> Action {
    let clear_credential = err.requires_new_credential();
    let message = if clear_credential {
        format!("🔑 {}\n{API_KEY_HELP}", err.user_message())
    } else {
        format!("⚠️ {}", err.user_message())
    };
    Action::Failed {
        message,
        clear_credential,
    }
}

/// Input of the solver.
#[derive(Debug, Clone, Default)]
pub struct SolveInput {
    /// Typed problem text, possibly empty
    pub problem: String,
    /// Topic hint
    pub topic: ChemistryTopic,
    /// Grade hint
    pub grade: ExamGrade,
    /// Uploaded problem file; takes precedence over everything else
    pub file: Option<UploadedFile>,
    /// Pasted problem images
    pub images: Vec<PastedImage>,
}

impl SolveInput {
    /// A text-only problem.
    pub fn text(problem: impl Into<String>, topic: ChemistryTopic, grade: ExamGrade) -> Self {
        Self {
            problem: problem.into(),
            topic,
            grade,
            ..Self::default()
        }
    }

    /// Whether there is nothing to solve.
    pub fn is_empty(&self) -> bool {
        self.problem.trim().is_empty() && self.file.is_none() && self.images.is_empty()
    }

    /// Progress line for this input.
    pub fn progress_message(&self) -> &'static str {
        if self.file.is_some() {
            "🔬 Đang đọc đề bài từ file..."
        } else if !self.images.is_empty() {
            "📸 Đang phân tích hình ảnh đề bài..."
        } else {
            "🧪 Đang phân tích và giải bài tập..."
        }
    }

    fn into_parts(self) -> Vec<ContentPart> {
        let Self {
            problem,
            topic,
            grade,
            file,
            images,
        } = self;

        if let Some(file) = file {
            return file.into_parts(PROBLEM_FILE_HEADING, SOLVE_FROM_FILE_PROMPT);
        }

        let prompt = if problem.trim().is_empty() {
            image_solve_prompt(images.len(), topic, grade)
        } else {
            solve_prompt(&problem, topic, grade)
        };
        let mut parts: Vec<ContentPart> = images.iter().map(PastedImage::to_part).collect();
        parts.push(ContentPart::text(prompt));
        parts
    }
}

/// Progress line while an exam is generated.
pub const EXAM_PROGRESS: &str = "📝 Đang tạo đề thi HSG Hóa Học...";
/// Progress line while a submission is graded.
pub const GRADING_PROGRESS: &str = "✅ Đang chấm và phân tích bài làm...";

/// Runs the tutoring workflows for one user.
#[derive(Debug, Clone)]
pub struct Tutor<G = GenerativeModel, A = Unrestricted> {
    client: GenerationClient<G>,
    settings: Settings,
    system_credential: Option<Credential>,
    gate: A,
}

impl<G: ContentGenerator, A: FeatureGate> Tutor<G, A> {
    /// Creates a tutor with no system credential.
    pub fn new(client: GenerationClient<G>, settings: Settings, gate: A) -> Self {
        Self {
            client,
            settings,
            system_credential: None,
            gate,
        }
    }

    /// Sets the shared key used by activated users without their own key.
    pub fn with_system_credential(mut self, key: impl Into<String>) -> Self {
        let credential = Credential::new(key);
        self.system_credential = (!credential.is_empty()).then_some(credential);
        self
    }

    /// Current settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The key to use: the user's own, else the system key if the gate allows.
    ///
    /// # Errors
    ///
    /// [`SessionError::RegistrationRequired`] when the user has no key and the
    /// gate refuses; [`SessionError::CredentialRequired`] when no key exists.
    pub fn resolve_credential(&self) -> Result<Credential, SessionError> {
        if let Some(own) = self.settings.user_credential() {
            return Ok(own);
        }
        if !self.gate.can_access_feature() {
            return Err(SessionError::RegistrationRequired);
        }
        self.system_credential
            .clone()
            .ok_or(SessionError::CredentialRequired)
    }

    async fn run(
        &self,
        mode: AppMode,
        parts: Vec<ContentPart>,
        system_instruction: &str,
    ) -> Result<String, SessionError> {
        let credential = self.resolve_credential()?;
        let model_id = self.settings.selected_model_id();
        info!(?mode, model = model_id, ?credential, parts = parts.len(), "starting generation");
        let text = self
            .client
            .generate(model_id, parts, &credential, Some(system_instruction))
            .await?;
        debug!(?mode, chars = text.chars().count(), "generation finished");
        Ok(text)
    }

    /// Solves a problem from a file, images or typed text, in that order of precedence.
    pub async fn solve(&self, input: SolveInput) -> Result<String, SessionError> {
        if input.is_empty() {
            return Err(SessionError::EmptyInput);
        }
        self.run(AppMode::Solver, input.into_parts(), SYSTEM_INSTRUCTION)
            .await
    }

    /// Generates an exam.
    pub async fn create_exam(&self, config: &ExamConfig) -> Result<String, SessionError> {
        self.run(
            AppMode::ExamCreator,
            vec![ContentPart::text(exam_prompt(config))],
            SYSTEM_INSTRUCTION,
        )
        .await
    }

    /// Grades an uploaded submission.
    pub async fn grade(&self, submission: UploadedFile) -> Result<String, SessionError> {
        self.run(
            AppMode::Grader,
            submission.into_parts(SUBMISSION_FILE_HEADING, GRADING_PROMPT),
            EVALUATOR_SYSTEM_INSTRUCTION,
        )
        .await
    }

    /// Checks the user's own key against the selected model.
    pub async fn test_connection(&self) -> Result<(), SessionError> {
        let credential = self
            .settings
            .user_credential()
            .ok_or(SessionError::CredentialRequired)?;
        self.client
            .test_connection(&credential, self.settings.selected_model_id())
            .await?;
        Ok(())
    }

    /// Tests `key` against the selected model and stores it only if it works.
    ///
    /// On success the key also becomes this tutor's own credential.
    ///
    /// # Errors
    ///
    /// [`SessionError::CredentialRequired`] for a blank key, the classified
    /// [`SessionError::Generation`] when the backend rejects it, and
    /// [`SessionError::Storage`] when the store cannot be written.
    pub async fn verify_and_store(
        &mut self,
        key: &str,
        store: &CredentialStore,
    ) -> Result<(), SessionError> {
        let credential = Credential::new(key);
        if credential.is_empty() {
            return Err(SessionError::CredentialRequired);
        }
        let model_id = self.settings.selected_model_id();
        self.client.test_connection(&credential, model_id).await?;
        info!(model = model_id, ?credential, "credential verified");

        store.save(credential.expose())?;
        self.settings.credential = credential.expose().to_string();
        Ok(())
    }
}
