use chem_tutor_ai::{
    access::{AccessGate, AdminCredentials, RegistrationStore},
    client::{GenerationClient, GenerativeModel},
    config::{AppConfig, CredentialStore},
    file::{ingest_file, ingest_or_none, FileContent, FileError, FileKind, MAX_FILE_SIZE},
    render::{export_document, save_document},
    session::{AppMode, SessionError, Tutor},
};

const SYSTEM_KEY: &str = "AIzaSySystemKey0123456789abc";

#[test]
fn activation_unlocks_system_credential() {
    let dir = tempfile::tempdir().unwrap();
    let registrations = dir.path().join("registrations.json");
    let phone = "0987 654 321";

    let mut store = RegistrationStore::open(&registrations).unwrap();
    store.register(phone, "Trần Thị B").unwrap();

    let config = AppConfig::load_from(&dir.path().join("config.json")).unwrap();
    let tutor = |store: RegistrationStore| {
        Tutor::new(
            GenerationClient::new(GenerativeModel::new()),
            config.settings(None),
            AccessGate::new(store, false, Some(phone.to_string())),
        )
        .with_system_credential(SYSTEM_KEY)
    };

    let pending = tutor(RegistrationStore::open(&registrations).unwrap());
    assert!(matches!(
        pending.resolve_credential(),
        Err(SessionError::RegistrationRequired)
    ));

    let admin = AdminCredentials {
        username: "admin".into(),
        password: "hoahoc".into(),
    };
    admin.login("admin", "hoahoc").unwrap();
    store.activate("0987654321").unwrap();

    let active = tutor(RegistrationStore::open(&registrations).unwrap());
    assert_eq!(active.resolve_credential().unwrap().expose(), SYSTEM_KEY);
}

#[test]
fn stored_key_overrides_system_key() {
    let dir = tempfile::tempdir().unwrap();
    let credentials = CredentialStore::new(dir.path().join("storage.json"));
    credentials.save("AIzaSyOwnKey0123456789abcdef").unwrap();

    let config = AppConfig::load_from(&dir.path().join("config.json")).unwrap();
    let registrations = RegistrationStore::open(dir.path().join("registrations.json")).unwrap();
    let tutor = Tutor::new(
        GenerationClient::new(GenerativeModel::new()),
        config.settings(credentials.load().unwrap()),
        AccessGate::new(registrations, false, None),
    )
    .with_system_credential(SYSTEM_KEY);

    assert_eq!(
        tutor.resolve_credential().unwrap().expose(),
        "AIzaSyOwnKey0123456789abcdef"
    );

    credentials.clear().unwrap();
    assert_eq!(credentials.load().unwrap(), None);
}

#[tokio::test]
async fn ingests_files_from_disk() {
    let dir = tempfile::tempdir().unwrap();

    let txt = dir.path().join("de_bai.txt");
    std::fs::write(&txt, "Câu 1: Hòa tan 2,4 g Mg trong HCl").unwrap();
    let file = ingest_file(&txt).await.unwrap();
    assert_eq!(file.kind, FileKind::Txt);
    assert_eq!(
        file.content,
        FileContent::Text("Câu 1: Hòa tan 2,4 g Mg trong HCl".into())
    );

    let pdf = dir.path().join("de_thi.pdf");
    std::fs::write(&pdf, b"%PDF-1.7\n").unwrap();
    let file = ingest_file(&pdf).await.unwrap();
    assert_eq!(file.mime_type, "application/pdf");
    assert!(matches!(file.content, FileContent::Binary(_)));

    let xlsx = dir.path().join("bang.xlsx");
    std::fs::write(&xlsx, b"PK").unwrap();
    assert!(matches!(
        ingest_file(&xlsx).await,
        Err(FileError::Unsupported(_))
    ));
    assert!(ingest_or_none(&xlsx).await.is_none());
}

#[tokio::test]
async fn rejects_oversize_files() {
    let dir = tempfile::tempdir().unwrap();
    let big = dir.path().join("big.txt");
    let file = std::fs::File::create(&big).unwrap();
    file.set_len(MAX_FILE_SIZE + 1).unwrap();

    assert!(matches!(
        ingest_file(&big).await,
        Err(FileError::TooLarge(_))
    ));
}

#[tokio::test]
async fn exported_document_lands_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let date = chrono::NaiveDate::from_ymd_opt(2025, 11, 20).unwrap();
    let doc = export_document("## Câu 1\n\n**Đáp án:** 4,48 lít", AppMode::Grader, date);

    let path = save_document(&doc, dir.path()).await.unwrap();
    assert_eq!(
        path.file_name().unwrap().to_str().unwrap(),
        "ChamBai_HoaHoc_2025-11-20.doc"
    );
    let html = std::fs::read_to_string(path).unwrap();
    assert!(html.contains("<strong>Đáp án:</strong>"));
}
