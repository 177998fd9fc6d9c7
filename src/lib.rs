//! npy2mat - NPY FOLDER TO MAT CONVERTER
//!
//! 폴더 내 NumPy `.npy` 배열 파일들을 MATLAB Level 5 `.mat` 파일로 변환하는 CLI 도구입니다.
//!
//! # 주요 기능
//!
//! - 🔁 **배치 변환**: 파일 하나가 실패해도 나머지 파일은 계속 변환
//! - 🧮 **정확한 보존**: 변수 이름, 모양, 원소 타입, 값을 그대로 유지
//! - 📊 **진행률 표시**: 처리 진행 상황과 상세 통계
//! - 🔍 **패턴 필터링**: glob 형식의 파일 이름 필터링
//! - ✅ **검증**: 기록한 `.mat`을 다시 읽어 원본과 비교
//! - 🧪 **드라이런/유효성 검사 모드**: 쓰기 없이 대상 확인
//! - 📝 **리포트**: 에러 로그와 JSON 변환 리포트
//!
//! # 예제
//!
//! ```bash
//! # 기본 사용법
//! npy2mat -i ./npy -o ./mat
//!
//! # 유효성 검사만
//! npy2mat -i ./npy --validate-only
//!
//! # 기존 스크립트처럼 변수 이름을 data로 고정
//! npy2mat -i ./npy -o ./mat --var-name data
//! ```

pub mod cli;
pub mod converter;
pub mod error;
pub mod mat;
pub mod npy;
pub mod pattern;
pub mod report;
pub mod stats;

// Re-exports for convenient access
pub use cli::{Args, WriteMode};
pub use converter::{
    convert, ConversionPlan, ConversionResult, ConversionRun, ConvertOptions, Converter,
    SourceArrayFile,
};
pub use error::{FailureKind, FileFailure, Npy2MatError, Result};
pub use mat::{read_mat, write_mat, MatVariable};
pub use npy::{decode_npy, ArrayPayload, ElementKind};
pub use pattern::PatternMatcher;
pub use stats::{format_bytes, Statistics};
