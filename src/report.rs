//! 리포트 파일 모듈
//!
//! 에러 로그(텍스트)와 변환 리포트(JSON)를 파일로 기록합니다.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::SystemTime;

use crate::converter::ConversionRun;

/// 에러 로그 파일 작성
pub fn write_error_log(log_path: &Path, run: &ConversionRun) -> io::Result<()> {
    let mut log_file = BufWriter::new(File::create(log_path)?);

    writeln!(log_file, "npy2mat 에러 로그")?;
    writeln!(log_file, "생성 시간: {}", unix_now())?;
    writeln!(log_file, "입력 폴더: {:?}", run.input_dir)?;
    writeln!(log_file, "총 에러 수: {}", run.failed)?;
    writeln!(log_file, "{}", "=".repeat(50))?;

    for result in run.failures() {
        writeln!(log_file, "\n파일: {:?}", result.source)?;
        if let Some(ref failure) = result.failure {
            writeln!(log_file, "분류: {}", failure.kind)?;
            writeln!(log_file, "에러: {}", failure.message)?;
        }
    }

    log_file.flush()
}

/// 실행 결과 전체를 JSON으로 기록
pub fn write_json_report(report_path: &Path, run: &ConversionRun) -> io::Result<()> {
    let mut writer = BufWriter::new(File::create(report_path)?);
    serde_json::to_writer_pretty(&mut writer, run)?;
    writeln!(writer)?;
    writer.flush()
}

/// 현재 시간 문자열 반환
fn unix_now() -> String {
    let duration = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default();
    format!("Unix timestamp: {}", duration.as_secs())
}
