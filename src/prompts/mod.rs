//! Topics, levels and the prompt templates sent to the model.

use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Chemistry topic of a problem or exam.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ChemistryTopic {
    /// Atoms and molecules
    NguyenTuPhanTu,
    /// The periodic table
    BangTuanHoan,
    /// Chemical bonding
    LienKetHoaHoc,
    /// Chemical reactions
    PhanUngHoaHoc,
    /// Oxides, acids, bases and salts
    OxitAxitBazoMuoi,
    /// Metals
    KimLoai,
    /// Non-metals
    PhiKim,
    /// Organic chemistry
    HoaHuuCo,
    /// Solutions
    DungDich,
    /// Reaction rate and equilibrium
    TocDoCanBang,
    /// Electrochemistry
    DienHoa,
    /// Mixed topics
    #[default]
    TongHop,
}

impl ChemistryTopic {
    /// Every topic, in display order.
    pub const ALL: [Self; 12] = [
        Self::NguyenTuPhanTu,
        Self::BangTuanHoan,
        Self::LienKetHoaHoc,
        Self::PhanUngHoaHoc,
        Self::OxitAxitBazoMuoi,
        Self::KimLoai,
        Self::PhiKim,
        Self::HoaHuuCo,
        Self::DungDich,
        Self::TocDoCanBang,
        Self::DienHoa,
        Self::TongHop,
    ];

    /// Vietnamese display name.
    pub fn name(self) -> &'static str {
        match self {
            Self::NguyenTuPhanTu => "Nguyên tử - Phân tử",
            Self::BangTuanHoan => "Bảng tuần hoàn",
            Self::LienKetHoaHoc => "Liên kết hóa học",
            Self::PhanUngHoaHoc => "Phản ứng hóa học",
            Self::OxitAxitBazoMuoi => "Oxit - Axit - Bazơ - Muối",
            Self::KimLoai => "Kim loại",
            Self::PhiKim => "Phi kim",
            Self::HoaHuuCo => "Hóa hữu cơ",
            Self::DungDich => "Dung dịch",
            Self::TocDoCanBang => "Tốc độ & Cân bằng",
            Self::DienHoa => "Điện hóa học",
            Self::TongHop => "Tổng hợp",
        }
    }
}

impl fmt::Display for ChemistryTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Target level of a generated exam.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum DifficultyLevel {
    /// Basic
    CoBan,
    /// Advanced
    NangCao,
    /// District gifted-student contest
    #[default]
    HsgHuyen,
    /// Provincial gifted-student contest
    HsgTinh,
    /// National gifted-student contest
    HsgQuocGia,
}

impl DifficultyLevel {
    /// Vietnamese display name.
    pub fn name(self) -> &'static str {
        match self {
            Self::CoBan => "Cơ bản",
            Self::NangCao => "Nâng cao",
            Self::HsgHuyen => "HSG Huyện/Quận",
            Self::HsgTinh => "HSG Tỉnh/TP",
            Self::HsgQuocGia => "HSG Quốc gia",
        }
    }
}

impl fmt::Display for DifficultyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// School grade, 8 through 12.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
pub enum ExamGrade {
    /// Grade 8
    #[value(name = "8")]
    #[serde(rename = "8")]
    Lop8,
    /// Grade 9
    #[default]
    #[value(name = "9")]
    #[serde(rename = "9")]
    Lop9,
    /// Grade 10
    #[value(name = "10")]
    #[serde(rename = "10")]
    Lop10,
    /// Grade 11
    #[value(name = "11")]
    #[serde(rename = "11")]
    Lop11,
    /// Grade 12
    #[value(name = "12")]
    #[serde(rename = "12")]
    Lop12,
}

impl ExamGrade {
    /// The grade number.
    pub fn number(self) -> u8 {
        match self {
            Self::Lop8 => 8,
            Self::Lop9 => 9,
            Self::Lop10 => 10,
            Self::Lop11 => 11,
            Self::Lop12 => 12,
        }
    }
}

impl fmt::Display for ExamGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Lớp {}", self.number())
    }
}

/// Persona for solving problems and writing exams.
pub const SYSTEM_INSTRUCTION: &str = "\
Bạn là một CHUYÊN GIA HÓA HỌC trình độ Tiến sĩ, nhiều năm bồi dưỡng học sinh giỏi KHTN môn Hóa học, \
chuyên ra đề và chấm thi HSG cấp Tỉnh và Quốc gia.

## YÊU CẦU
1. Mọi phương trình, công thức, số liệu phải chính xác.
2. Luôn cân bằng phương trình hóa học đầy đủ, hệ số nguyên tối giản.
3. Ghi rõ đơn vị trong mọi phép tính (mol, g, ml, M, %, g/mol...).
4. Trình bày lời giải theo từng bước, nêu phương pháp trước khi giải.
5. Dùng ký hiệu hóa học chuẩn (H₂SO₄, NaOH, Fe₂O₃...), viết bằng tiếng Việt.

## KHI VIẾT PHƯƠNG TRÌNH
- Dùng → cho mũi tên phản ứng, ghi điều kiện (t°, xt...) phía trên mũi tên.
- Ghi trạng thái (r), (l), (k), (dd) khi cần.
- Ví dụ: Fe + 2HCl → FeCl₂ + H₂↑
";

/// Persona for grading submissions.
pub const EVALUATOR_SYSTEM_INSTRUCTION: &str = "\
Bạn là giám khảo chấm thi HSG Hóa học cấp Tỉnh/Quốc gia giàu kinh nghiệm.
Chấm chính xác, công bằng, chi tiết; nhận xét mang tính xây dựng, chỉ ra điểm mạnh và điểm yếu cụ thể.
Cho điểm theo thang 10 với bước nhảy 0.25 điểm.
";

/// Prompt for solving a typed-in problem.
pub fn solve_prompt(problem: &str, topic: ChemistryTopic, grade: ExamGrade) -> String {
    format!(
        "## YÊU CẦU: GIẢI CHI TIẾT BÀI TẬP HÓA HỌC

**Chủ đề:** {topic}
**Lớp:** {grade}

**ĐỀ BÀI:**
{problem}

## HƯỚNG DẪN TRÌNH BÀY
### 📋 PHÂN TÍCH ĐỀ
- Dữ kiện đã cho, yêu cầu cần tìm, dạng bài và phương pháp giải

### 🔬 LỜI GIẢI CHI TIẾT
**Bước 1:** Viết các phương trình hóa học liên quan (cân bằng đầy đủ)
**Bước 2:** Tính toán theo từng bước, ghi rõ đơn vị
**Bước 3:** Kết luận, trả lời đúng yêu cầu đề bài

### 💡 GHI CHÚ & MỞ RỘNG
- Cách giải nhanh (nếu có), sai lầm thường gặp, kiến thức cần nhớ
"
    )
}

/// Prompt appended after an uploaded problem file.
pub const SOLVE_FROM_FILE_PROMPT: &str = "\
## YÊU CẦU: GIẢI CHI TIẾT CÁC BÀI TẬP HÓA HỌC TRONG FILE

Đọc file đề bài và giải chi tiết TỪNG CÂU theo thứ tự. Với mỗi câu trình bày:
1. **Đề bài** (trích ngắn gọn)
2. **Phân tích** (dạng bài, phương pháp)
3. **Lời giải chi tiết** (từng bước, cân bằng phương trình, ghi đơn vị)
4. **Đáp số**

Sau cùng thêm **TỔNG KẾT** các kiến thức trọng tâm và **LƯU Ý** các sai lầm thường gặp.
";

/// Heading placed above text extracted from an uploaded problem file.
pub const PROBLEM_FILE_HEADING: &str = "ĐỀ BÀI TỪ FILE";

/// Heading placed above text extracted from a submission to grade.
pub const SUBMISSION_FILE_HEADING: &str = "BÀI LÀM CẦN CHẤM";

/// Prompt sent after pasted images when no problem text was typed.
pub fn image_solve_prompt(image_count: usize, topic: ChemistryTopic, grade: ExamGrade) -> String {
    let source = if image_count > 1 {
        "các hình ảnh"
    } else {
        "hình ảnh"
    };
    format!(
        "Hãy đọc đề bài Hóa Học trong {source} trên và giải chi tiết từng câu.

Chủ đề: {topic}
Lớp: {}

Yêu cầu: Giải chi tiết, cân bằng phương trình, ghi đơn vị đầy đủ.",
        grade.number()
    )
}

/// Parameters of a generated exam.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamConfig {
    /// Topic the exam covers
    pub topic: ChemistryTopic,
    /// Target grade
    pub grade: ExamGrade,
    /// Target level
    pub difficulty: DifficultyLevel,
    /// Number of questions
    pub question_count: u32,
    /// Whether to append a marking scheme
    pub include_answer: bool,
    /// Time allowed, in minutes
    pub time_limit: u32,
    /// Free-form extra requirements
    pub custom_requirements: String,
}

impl Default for ExamConfig {
    fn default() -> Self {
        Self {
            topic: ChemistryTopic::default(),
            grade: ExamGrade::default(),
            difficulty: DifficultyLevel::default(),
            question_count: 5,
            include_answer: true,
            time_limit: 150,
            custom_requirements: String::new(),
        }
    }
}

/// Prompt for generating an exam.
pub fn exam_prompt(config: &ExamConfig) -> String {
    let ExamConfig {
        topic,
        grade,
        difficulty,
        question_count,
        include_answer,
        time_limit,
        custom_requirements,
    } = config;

    let extra = if custom_requirements.trim().is_empty() {
        String::new()
    } else {
        format!("- **Yêu cầu thêm:** {}\n", custom_requirements.trim())
    };

    let answers = if *include_answer {
        "
### ✅ PHẦN ĐÁP ÁN - HƯỚNG DẪN CHẤM
Sau phần đề bài, trình bày đáp án chi tiết cho từng câu: lời giải từng bước, \
phương trình cân bằng đầy đủ, thang điểm chi tiết cho từng ý.
"
    } else {
        ""
    };

    format!(
        "## YÊU CẦU: TẠO ĐỀ THI HỌC SINH GIỎI HÓA HỌC

### THÔNG TIN ĐỀ THI
- **Chủ đề:** {topic}
- **Lớp:** {grade_no}
- **Cấp độ:** {difficulty}
- **Số câu hỏi:** {question_count} câu
- **Thời gian làm bài:** {time_limit} phút
{extra}
### 📝 PHẦN ĐỀ BÀI
Tạo {question_count} câu hỏi tự luận: 30% vận dụng cơ bản, 40% vận dụng nâng cao, \
30% vận dụng sáng tạo. Đánh số Câu 1, Câu 2...; ghi điểm từng câu/phần (tổng 10 điểm); \
dữ kiện chính xác, không mâu thuẫn, số liệu cho kết quả đẹp; phù hợp trình độ {difficulty}.
{answers}
### TRÌNH BÀY
- Tiêu đề: **ĐỀ THI HỌC SINH GIỎI HÓA HỌC LỚP {grade_no}**
- Ghi rõ: Thời gian làm bài: {time_limit} phút
",
        grade_no = grade.number()
    )
}

/// Prompt appended after a submission to grade.
pub const GRADING_PROMPT: &str = "\
## YÊU CẦU: CHẤM ĐIỂM BÀI LÀM HÓA HỌC

### 📊 TIÊU CHÍ (thang 10)
1. **Phương trình hóa học (2.5đ):** viết đúng, cân bằng đúng, điều kiện phản ứng, trạng thái chất
2. **Phương pháp giải (2.5đ):** xác định dạng bài, chọn phương pháp, trình bày logic
3. **Tính toán (3đ):** lập biểu thức, tính chính xác, ghi đơn vị
4. **Kết luận & trình bày (2đ):** trả lời đúng yêu cầu, trình bày sạch đẹp, đúng thuật ngữ

### 📝 OUTPUT
**BẢNG ĐIỂM TỔNG HỢP:**
| Tiêu chí | Điểm | Nhận xét |
|----------|------|----------|
| Phương trình | x/2.5 | ... |
| Phương pháp | x/2.5 | ... |
| Tính toán | x/3 | ... |
| Kết luận & Trình bày | x/2 | ... |
| **TỔNG** | **x/10** | |

**CHI TIẾT TỪNG CÂU:** phần đúng ✅, phần sai ❌ (chỉ rõ lỗi và cách sửa), phần thiếu ⚠️

**GỢI Ý CẢI THIỆN** và **XẾP LOẠI:** Giỏi (8-10) / Khá (6.5-7.75) / TB (5-6.25) / Yếu (<5)
";
