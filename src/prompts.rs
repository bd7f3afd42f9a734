//! Transcription instructions, one per [`DocumentProfile`].
//!
//! The instruction is sent as the text part of the user turn, right after
//! the page image. Keeping the table here means a prompt tweak never touches
//! the retry or batch code, and tests can inspect the exact wording.

use crate::config::DocumentProfile;

/// General documents: preserve structure.
pub const GENERAL_INSTRUCTION: &str = "이 이미지에 포함된 모든 텍스트를 정확히 추출해 주세요.
다음 사항을 지켜주세요:
- 원본의 줄바꿈과 단락 구조를 최대한 유지해 주세요
- 제목, 소제목 등의 계층구조를 보존해 주세요
- 특수문자나 기호도 정확히 포함해 주세요
- 표가 있다면 표 형태로 정리해 주세요
- 한글과 영어가 섞여 있어도 모두 정확히 추출해 주세요";

/// Table-heavy documents: keep row/column layout.
pub const TABLE_INSTRUCTION: &str = "이 이미지의 표를 정확히 추출해 주세요.
- 행과 열 구조를 명확히 구분해 주세요
- 셀 병합이 있다면 표시해 주세요
- 숫자 데이터는 정확히 보존해 주세요
- 표의 헤더와 내용을 구분해 주세요";

/// Handwriting: mark uncertain readings inline.
pub const HANDWRITTEN_INSTRUCTION: &str = "이 손글씨 문서의 텍스트를 추출해 주세요.
- 읽기 어려운 부분은 [불명확] 표시해 주세요
- 추정되는 단어는 [추정: 단어] 형태로 표시해 주세요
- 가능한 한 정확하게 읽어주세요";

/// Forms: separate field names from values.
pub const FORM_INSTRUCTION: &str = "이 양식/폼의 모든 텍스트를 추출해 주세요.
- 필드명과 입력된 값을 구분해 주세요
- 체크박스나 선택 항목의 상태도 표시해 주세요
- 양식의 구조를 유지해 주세요";

/// Returned in place of a transcription when the model reply has no text.
pub const NO_TEXT_SENTINEL: &str = "텍스트를 추출할 수 없습니다.";

/// The instruction sent with every page of a run using `profile`.
pub fn instruction_for(profile: DocumentProfile) -> &'static str {
    match profile {
        DocumentProfile::General => GENERAL_INSTRUCTION,
        DocumentProfile::Table => TABLE_INSTRUCTION,
        DocumentProfile::Handwritten => HANDWRITTEN_INSTRUCTION,
        DocumentProfile::Form => FORM_INSTRUCTION,
    }
}
