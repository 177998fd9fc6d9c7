//! CLI 인자 파싱 모듈
//!
//! clap을 사용한 명령줄 인자 정의 및 파싱을 담당합니다.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::converter::ConvertOptions;

/// 출력 파일 모드
#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq)]
pub enum WriteMode {
    /// 기존 파일이 있으면 덮어쓰기
    #[default]
    Overwrite,
    /// 기존 파일이 있으면 해당 파일만 실패 처리
    Error,
}

impl std::fmt::Display for WriteMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteMode::Overwrite => write!(f, "Overwrite"),
            WriteMode::Error => write!(f, "Error"),
        }
    }
}

/// npy2mat CLI 인자 구조체
#[derive(Parser, Debug)]
#[command(
    name = "npy2mat",
    author = "YourName <your@email.com>",
    version,
    about = "NPY FOLDER TO MAT CONVERTER - 폴더 내 .npy 배열 파일들을 MATLAB .mat 파일로 변환하는 CLI 도구",
    long_about = r#"
NPY FOLDER TO MAT CONVERTER
===========================

지정된 폴더 안의 모든 .npy 파일을 하나씩 읽어
같은 이름의 MATLAB Level 5 .mat 파일로 저장합니다.

특징:
  • 파일별 독립 처리 (한 파일이 실패해도 나머지는 계속 변환)
  • 배열 이름/모양/원소 타입/값 보존
  • 진행률 표시 및 상세 통계
  • 기록 후 재검증, 유효성 검사 전용 모드
  • JSON 변환 리포트 및 에러 로그

예제:
  npy2mat -i ./npy -o ./mat
  npy2mat -i ./npy -o ./mat --verify --report report.json
  npy2mat -i ./npy -o ./mat --var-name data
  npy2mat -i ./npy --validate-only
  npy2mat -i ./npy -o ./mat --pattern "weights_*" --dry-run
"#
)]
pub struct Args {
    /// .npy 파일들이 있는 입력 폴더 경로
    #[arg(short, long)]
    pub input: PathBuf,

    /// .mat 파일을 저장할 출력 폴더 경로 (없으면 생성)
    #[arg(short, long, required_unless_present = "validate_only")]
    pub output: Option<PathBuf>,

    /// 출력 파일 모드
    #[arg(short, long, value_enum, default_value_t = WriteMode::Overwrite)]
    pub mode: WriteMode,

    /// 파일 이름 패턴 필터 (glob 형식, 예: "weights_*", "run?.npy")
    #[arg(short, long)]
    pub pattern: Option<String>,

    /// 모든 파일에 사용할 고정 변수 이름 (기본값: 파일 이름)
    #[arg(long)]
    pub var_name: Option<String>,

    /// 기록한 .mat 파일을 다시 읽어 원본과 비교
    #[arg(long)]
    pub verify: bool,

    /// 상세 출력 모드
    #[arg(short, long)]
    pub verbose: bool,

    /// 실제 변환 없이 처리될 파일 목록만 표시
    #[arg(long)]
    pub dry_run: bool,

    /// .npy 유효성 검사만 수행 (변환 없음)
    #[arg(long)]
    pub validate_only: bool,

    /// 에러 로그 파일 경로
    #[arg(long)]
    pub log: Option<PathBuf>,

    /// JSON 변환 리포트 파일 경로
    #[arg(long)]
    pub report: Option<PathBuf>,
}

impl Args {
    /// 인자를 변환 옵션으로 매핑
    pub fn to_options(&self) -> ConvertOptions {
        ConvertOptions::new()
            .with_write_mode(self.mode)
            .with_pattern(self.pattern.clone())
            .with_variable_name(self.var_name.clone())
            .with_verify(self.verify)
    }
}
