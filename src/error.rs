//! 에러 타입 정의 모듈
//!
//! npy2mat에서 발생할 수 있는 모든 에러 타입을 정의합니다.
//! 디렉토리 에러만 변환 호출 밖으로 전파되고, 파일 단위 에러는
//! [`FileFailure`]로 바뀌어 결과 레코드에 기록됩니다.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// npy2mat에서 발생할 수 있는 에러 타입
#[derive(Error, Debug)]
pub enum Npy2MatError {
    /// 입력 폴더가 존재하지 않음
    #[error("입력 폴더를 찾을 수 없습니다: {path}")]
    InputNotFound { path: PathBuf },

    /// 입력이 폴더가 아님
    #[error("입력 경로가 폴더가 아닙니다: {path}")]
    NotADirectory { path: PathBuf },

    /// 입력 폴더를 읽을 수 없음
    #[error("입력 폴더를 읽을 수 없습니다 ({path}): {reason}")]
    DirectoryUnreadable { path: PathBuf, reason: String },

    /// 출력 폴더를 만들거나 쓸 수 없음
    #[error("출력 폴더를 사용할 수 없습니다 ({path}): {reason}")]
    OutputUnavailable { path: PathBuf, reason: String },

    /// .npy 파일 읽기/해석 실패
    #[error(".npy 디코딩 실패 ({file}): {reason}")]
    Decode { file: PathBuf, reason: String },

    /// .mat으로 표현할 수 없는 원소 타입
    #[error("지원하지 않는 원소 타입 ({file}): {descr}")]
    UnsupportedElementType { file: PathBuf, descr: String },

    /// .mat 파일 쓰기 실패
    #[error(".mat 인코딩 실패 ({file}): {reason}")]
    Encode { file: PathBuf, reason: String },

    /// 출력 파일이 이미 존재 (Error 모드에서)
    #[error("출력 파일이 이미 존재합니다: {path}")]
    DestinationExists { path: PathBuf },

    /// 기록한 .mat 파일이 원본과 다름
    #[error("검증 실패 ({file}): {reason}")]
    Verify { file: PathBuf, reason: String },

    /// 유효하지 않은 패턴
    #[error("유효하지 않은 패턴: {pattern}")]
    InvalidPattern { pattern: String },

    /// 유효하지 않은 변수 이름
    #[error("유효하지 않은 변수 이름: {name:?}")]
    InvalidVariableName { name: String },
}

impl Npy2MatError {
    /// 변환 전체를 중단시키는 디렉토리 에러인지 확인
    pub fn is_directory_error(&self) -> bool {
        matches!(
            self,
            Npy2MatError::InputNotFound { .. }
                | Npy2MatError::NotADirectory { .. }
                | Npy2MatError::DirectoryUnreadable { .. }
                | Npy2MatError::OutputUnavailable { .. }
        )
    }

    /// 파일 단위 에러의 분류 (디렉토리/설정 에러는 None)
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Npy2MatError::Decode { .. } | Npy2MatError::UnsupportedElementType { .. } => {
                Some(FailureKind::Decode)
            }
            Npy2MatError::Encode { .. } | Npy2MatError::DestinationExists { .. } => {
                Some(FailureKind::Encode)
            }
            Npy2MatError::Verify { .. } => Some(FailureKind::Verify),
            _ => None,
        }
    }
}

/// 파일 단위 실패 분류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// 원본 .npy를 읽거나 해석하지 못함
    Decode,
    /// 대상 .mat을 쓰지 못함
    Encode,
    /// 다시 읽은 .mat이 원본과 다름
    Verify,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Decode => write!(f, "decode"),
            FailureKind::Encode => write!(f, "encode"),
            FailureKind::Verify => write!(f, "verify"),
        }
    }
}

/// 결과 레코드에 담기는 실패 정보
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl From<Npy2MatError> for FileFailure {
    fn from(err: Npy2MatError) -> Self {
        Self {
            kind: err.failure_kind().unwrap_or(FailureKind::Encode),
            message: err.to_string(),
        }
    }
}

/// npy2mat 결과 타입 별칭
pub type Result<T> = std::result::Result<T, Npy2MatError>;
