use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chem_tutor_ai::{
    access::{AccessGate, RegistrationStore},
    client::{GenerationClient, GenerativeModel},
    config::{config_dir, AppConfig, CredentialStore},
    file::{ingest_file, PastedImage, UploadedFile},
    models::{Credential, CredentialMode},
    prompts::{ChemistryTopic, DifficultyLevel, ExamConfig, ExamGrade},
    render::{copy_to_clipboard, default_export_dir, export_document, preprocess_chemistry, save_document},
    session::{
        failure_action, reduce, Action, AppMode, AppState, SessionError, API_KEY_HELP,
        EXAM_PROGRESS, GRADING_PROGRESS,
    },
    ErrorClassifier, RetryController, SolveInput, Tutor,
};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "chem-tutor-ai", version, about = "HSG Hóa Học AI: giải bài, tạo đề thi và chấm bài")]
struct Cli {
    /// Model id, or "custom" to use the configured custom model
    #[arg(long, global = true)]
    model: Option<String>,

    /// Registered phone number, for using the shared key
    #[arg(long, global = true, env = "CHEM_TUTOR_PHONE")]
    phone: Option<String>,

    /// Save the result as a Word document (default: Downloads)
    #[arg(long, global = true, value_name = "DIR")]
    export: Option<Option<PathBuf>>,

    /// Print the model output without math preprocessing
    #[arg(long, global = true)]
    raw: bool,

    /// Copy the raw result to the clipboard
    #[arg(long, global = true)]
    copy: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Solve a chemistry problem
    Solve {
        /// Problem text
        problem: Option<String>,
        /// Problem file (.pdf, .docx, .txt)
        #[arg(long)]
        file: Option<PathBuf>,
        /// Image of the problem; may be repeated
        #[arg(long = "image", value_name = "PATH")]
        images: Vec<PathBuf>,
        #[arg(long, value_enum, default_value_t = ChemistryTopic::default())]
        topic: ChemistryTopic,
        #[arg(long, value_enum, default_value_t = ExamGrade::default())]
        grade: ExamGrade,
    },
    /// Generate a gifted-student exam
    Exam {
        #[arg(long, value_enum, default_value_t = ChemistryTopic::default())]
        topic: ChemistryTopic,
        #[arg(long, value_enum, default_value_t = ExamGrade::default())]
        grade: ExamGrade,
        #[arg(long, value_enum, default_value_t = DifficultyLevel::default())]
        difficulty: DifficultyLevel,
        /// Number of questions
        #[arg(long, default_value_t = 5)]
        questions: u32,
        /// Time limit in minutes
        #[arg(long, default_value_t = 150)]
        time: u32,
        /// Leave out the marking scheme
        #[arg(long)]
        no_answer: bool,
        /// Extra requirements for the exam
        #[arg(long)]
        require: Option<String>,
    },
    /// Grade a submission file
    Grade {
        /// Submission (.pdf, .docx, .txt)
        file: PathBuf,
    },
    /// Store your own Gemini API key
    Login {
        /// API key from aistudio.google.com/apikey
        key: String,
    },
    /// Forget the stored API key
    Logout,
    /// Check the stored API key against the selected model
    TestConnection,
    /// Register a phone number for the shared key
    Register {
        /// 10-digit phone number starting with 0
        phone: String,
        /// Full name
        name: String,
    },
    /// Review registrations
    Admin {
        #[arg(long, default_value = "admin")]
        username: String,
        #[arg(long, env = "CHEM_TUTOR_ADMIN_PASSWORD", hide_env_values = true)]
        password: String,
        #[command(subcommand)]
        action: AdminCommand,
    },
}

#[derive(Debug, Subcommand)]
enum AdminCommand {
    /// List pending and activated registrations
    List,
    /// Activate a phone
    Activate { phone: String },
    /// Reject a pending phone
    Reject { phone: String },
    /// Remove a phone entirely
    Deactivate { phone: String },
}

enum Job {
    Solve(SolveInput),
    Exam(ExamConfig),
    Grade(UploadedFile),
}

impl Job {
    fn mode(&self) -> AppMode {
        match self {
            Self::Solve(_) => AppMode::Solver,
            Self::Exam(_) => AppMode::ExamCreator,
            Self::Grade(_) => AppMode::Grader,
        }
    }

    fn progress(&self) -> &'static str {
        match self {
            Self::Solve(input) => input.progress_message(),
            Self::Exam(_) => EXAM_PROGRESS,
            Self::Grade(_) => GRADING_PROGRESS,
        }
    }
}

struct Output {
    export: Option<Option<PathBuf>>,
    raw: bool,
    copy: bool,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn spinner(message: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

fn registrations() -> Result<RegistrationStore> {
    Ok(RegistrationStore::open(
        config_dir()?.join("registrations.json"),
    )?)
}

fn build_tutor(
    config: &AppConfig,
    store: &CredentialStore,
    model: Option<String>,
    phone: Option<String>,
) -> Result<Tutor<GenerativeModel, AccessGate>> {
    let mut settings = config.settings(store.load()?);
    if let Some(model) = model {
        settings.model = model;
    }

    let retry = RetryController::new(
        config.retry.clone(),
        ErrorClassifier::new(config.classifier.clone()),
    );
    let client = GenerationClient::new(GenerativeModel::with_base_url(config.base_url.as_str()))
        .with_retry(retry);
    let gate = AccessGate::new(registrations()?, false, phone);

    Ok(Tutor::new(client, settings, gate).with_system_credential(config.system_credential.as_str()))
}

async fn run_job(
    tutor: &Tutor<GenerativeModel, AccessGate>,
    store: &CredentialStore,
    job: Job,
    output: Output,
) -> Result<()> {
    let mode = job.mode();
    let state = reduce(AppState::default(), Action::SwitchMode(mode));
    let state = reduce(
        state,
        Action::Start {
            progress: job.progress().to_string(),
        },
    );

    let pb = spinner(state.progress.as_deref().unwrap_or_default())?;
    let outcome = match job {
        Job::Solve(input) => tutor.solve(input).await,
        Job::Exam(config) => tutor.create_exam(&config).await,
        Job::Grade(file) => tutor.grade(file).await,
    };
    pb.finish_and_clear();

    let text = match outcome {
        Ok(text) => text,
        Err(err) => return report_failure(state, store, &err),
    };
    let state = reduce(state, Action::Succeeded(text));
    debug!(step = ?state.step, "generation completed");

    println!("# {}\n", mode.title());
    if output.raw {
        println!("{}", state.result);
    } else {
        println!("{}", preprocess_chemistry(&state.result));
    }

    if let Some(dir) = output.export {
        let document = export_document(&state.result, mode, chrono::Local::now().date_naive());
        let dir = dir.unwrap_or_else(default_export_dir);
        let path = save_document(&document, &dir).await?;
        eprintln!("📄 Đã lưu: {}", path.display());
    }

    if output.copy {
        copy_to_clipboard(&state.result)?;
        eprintln!("📋 Đã copy");
    }

    Ok(())
}

fn report_failure(state: AppState, store: &CredentialStore, err: &SessionError) -> Result<()> {
    let action = failure_action(err);
    if let Action::Failed {
        clear_credential: true,
        ..
    } = action
    {
        store.clear()?;
    }
    let state = reduce(state, action);
    if matches!(err, SessionError::RegistrationRequired) {
        eprintln!("Dùng lệnh `register <số điện thoại> <họ tên>` hoặc `login <API key>`.");
    }
    bail!("{}", state.error.unwrap_or_else(|| err.user_message()))
}

async fn solve_input(
    problem: Option<String>,
    file: Option<PathBuf>,
    images: Vec<PathBuf>,
    topic: ChemistryTopic,
    grade: ExamGrade,
) -> Result<SolveInput> {
    let file = match file {
        Some(path) => Some(
            ingest_file(&path)
                .await
                .with_context(|| format!("Không đọc được file {}", path.display()))?,
        ),
        None => None,
    };

    let mut pasted = Vec::with_capacity(images.len());
    for path in images {
        pasted.push(
            PastedImage::from_path(&path)
                .await
                .with_context(|| format!("Không đọc được ảnh {}", path.display()))?,
        );
    }

    Ok(SolveInput {
        problem: problem.unwrap_or_default(),
        topic,
        grade,
        file,
        images: pasted,
    })
}

fn admin(action: AdminCommand) -> Result<()> {
    let mut store = registrations()?;
    match action {
        AdminCommand::List => {
            println!("⏳ Chờ duyệt ({})", store.pending().len());
            for r in store.pending() {
                println!("  {}  {}  {}", r.phone, r.full_name, r.timestamp.format("%Y-%m-%d %H:%M"));
            }
            println!("✅ Đã kích hoạt ({})", store.activated().len());
            for r in store.activated() {
                println!("  {}  {}", r.phone, r.full_name);
            }
        }
        AdminCommand::Activate { phone } => {
            store.activate(&phone)?;
            println!("✅ Đã kích hoạt {phone}");
        }
        AdminCommand::Reject { phone } => {
            store.reject(&phone)?;
            println!("Đã từ chối {phone}");
        }
        AdminCommand::Deactivate { phone } => {
            store.deactivate(&phone)?;
            println!("Đã xóa {phone}");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = AppConfig::load()?;
    let store = CredentialStore::open_default()?;
    let output = Output {
        export: cli.export,
        raw: cli.raw,
        copy: cli.copy,
    };

    match cli.command {
        Command::Solve {
            problem,
            file,
            images,
            topic,
            grade,
        } => {
            let input = solve_input(problem, file, images, topic, grade).await?;
            let tutor = build_tutor(&config, &store, cli.model, cli.phone)?;
            run_job(&tutor, &store, Job::Solve(input), output).await
        }
        Command::Exam {
            topic,
            grade,
            difficulty,
            questions,
            time,
            no_answer,
            require,
        } => {
            let exam = ExamConfig {
                topic,
                grade,
                difficulty,
                question_count: questions,
                include_answer: !no_answer,
                time_limit: time,
                custom_requirements: require.unwrap_or_default(),
            };
            let tutor = build_tutor(&config, &store, cli.model, cli.phone)?;
            run_job(&tutor, &store, Job::Exam(exam), output).await
        }
        Command::Grade { file } => {
            let submission = ingest_file(&file)
                .await
                .with_context(|| format!("Không đọc được file {}", file.display()))?;
            let tutor = build_tutor(&config, &store, cli.model, cli.phone)?;
            run_job(&tutor, &store, Job::Grade(submission), output).await
        }
        Command::Login { key } => {
            if Credential::new(key.as_str()).mode() == CredentialMode::Demo {
                eprintln!("⚠️ Key này sẽ chạy ở chế độ DEMO (không gọi API thật).");
            }
            let mut tutor = build_tutor(&config, &store, cli.model, cli.phone)?;
            let pb = spinner("Đang kiểm tra API Key...")?;
            let result = tutor.verify_and_store(&key, &store).await;
            pb.finish_and_clear();
            match result {
                Ok(()) => {
                    println!("🔑 Đã lưu API Key ({}).", tutor.settings().selected_model_id());
                    Ok(())
                }
                Err(err) => bail!("❌ {}\n{API_KEY_HELP}", err.user_message()),
            }
        }
        Command::Logout => {
            store.clear()?;
            println!("Đã xóa API Key.");
            Ok(())
        }
        Command::TestConnection => {
            let tutor = build_tutor(&config, &store, cli.model, cli.phone)?;
            let pb = spinner("Đang kiểm tra kết nối...")?;
            let result = tutor.test_connection().await;
            pb.finish_and_clear();
            match result {
                Ok(()) => {
                    println!("✅ Kết nối thành công ({})", tutor.settings().selected_model_id());
                    Ok(())
                }
                Err(err) => bail!("❌ {}", err.user_message()),
            }
        }
        Command::Register { phone, name } => {
            registrations()?.register(&phone, &name)?;
            println!("Đăng ký thành công! Vui lòng chờ Admin duyệt tài khoản của bạn.");
            Ok(())
        }
        Command::Admin {
            username,
            password,
            action,
        } => {
            config.admin.login(&username, &password)?;
            admin(action)
        }
    }
}
