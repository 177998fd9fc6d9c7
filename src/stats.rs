//! 통계 및 유틸리티 모듈
//!
//! 변환 실행 결과 요약과 포맷팅을 담당합니다.

use colored::Colorize;
use std::time::Duration;

use crate::converter::ConversionRun;

/// 처리 통계 구조체
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Statistics {
    /// 총 파일 수
    pub total_files: usize,
    /// 성공 처리 수
    pub success_count: usize,
    /// 에러 발생 수
    pub error_count: usize,
    /// 건너뛴 파일 수
    pub skipped_count: usize,
    /// 읽은 총 바이트
    pub total_bytes_read: u64,
    /// 쓴 총 바이트
    pub total_bytes_written: u64,
    /// 처리 시간
    pub elapsed: Duration,
    /// 도중에 취소됨
    pub cancelled: bool,
}

impl Statistics {
    /// 실행 결과에서 통계 생성
    pub fn from_run(run: &ConversionRun) -> Self {
        Self {
            total_files: run.attempted,
            success_count: run.succeeded,
            error_count: run.failed,
            skipped_count: run.skipped.len(),
            total_bytes_read: run.total_bytes_read(),
            total_bytes_written: run.total_bytes_written(),
            elapsed: run.elapsed,
            cancelled: run.cancelled,
        }
    }

    /// 성공률 (%), 파일이 없으면 None
    pub fn success_rate(&self) -> Option<f64> {
        if self.total_files > 0 {
            Some((self.success_count as f64 / self.total_files as f64) * 100.0)
        } else {
            None
        }
    }

    /// 변환 통계 요약 출력
    pub fn print_summary(&self) {
        println!("\n{}", "═".repeat(50).bright_blue());
        println!("{}", " 📊 변환 통계".bright_white().bold());
        println!("{}", "═".repeat(50).bright_blue());

        self.print_counts("성공", "실패");

        println!(
            "  {} 입력 용량:    {}",
            "📥".bright_yellow(),
            format_bytes(self.total_bytes_read)
        );
        println!(
            "  {} 출력 용량:    {}",
            "📤".bright_magenta(),
            format_bytes(self.total_bytes_written)
        );

        if let Some(rate) = self.success_rate() {
            println!("  {} 성공률:       {:.1}%", "📈".bright_white(), rate);
        }

        println!(
            "  {} 처리 시간:    {}",
            "⏱️".bright_cyan(),
            format_duration(self.elapsed)
        );

        if self.cancelled {
            println!("  {} {}", "⚠️".bright_yellow(), "취소되어 일부 파일을 처리하지 않았습니다".yellow());
        }

        println!("{}", "═".repeat(50).bright_blue());
    }

    /// 유효성 검사 통계 요약 출력
    pub fn print_validation_summary(&self) {
        println!("\n{}", "═".repeat(50).bright_blue());
        println!("{}", " 🔍 유효성 검사 결과".bright_white().bold());
        println!("{}", "═".repeat(50).bright_blue());

        self.print_counts("유효", "무효");

        if let Some(rate) = self.success_rate() {
            println!("  {} 유효율:       {:.1}%", "📈".bright_white(), rate);
        }

        println!(
            "  {} 검사 시간:    {}",
            "⏱️".bright_cyan(),
            format_duration(self.elapsed)
        );

        println!("{}", "═".repeat(50).bright_blue());
    }

    fn print_counts(&self, ok_label: &str, failed_label: &str) {
        println!(
            "  {} 전체 파일:    {}",
            "📁".bright_cyan(),
            self.total_files
        );
        println!(
            "  {} {}:         {}",
            "✅".bright_green(),
            ok_label,
            self.success_count.to_string().green()
        );

        if self.error_count > 0 {
            println!(
                "  {} {}:         {}",
                "❌".bright_red(),
                failed_label,
                self.error_count.to_string().red()
            );
        } else {
            println!("  {} {}:         {}", "✅".bright_green(), failed_label, "0".green());
        }

        if self.skipped_count > 0 {
            println!(
                "  {} 건너뜀:       {}",
                "⏭️".bright_white(),
                self.skipped_count.to_string().dimmed()
            );
        }
    }
}

/// 바이트를 읽기 쉬운 형식으로 변환
///
/// # Arguments
/// * `bytes` - 바이트 수
///
/// # Returns
/// 형식화된 문자열 (예: "1.25 MB")
///
/// # Examples
/// ```
/// use npy2mat::stats::format_bytes;
///
/// assert_eq!(format_bytes(500), "500 B");
/// assert_eq!(format_bytes(1024), "1.00 KB");
/// assert_eq!(format_bytes(1048576), "1.00 MB");
/// ```
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// 경과 시간을 읽기 쉬운 형식으로 변환
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let millis = duration.subsec_millis();

    if secs >= 3600 {
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        format!("{}시간 {}분", hours, mins)
    } else if secs >= 60 {
        let mins = secs / 60;
        let remaining_secs = secs % 60;
        format!("{}분 {}초", mins, remaining_secs)
    } else if secs > 0 {
        format!("{}.{:03}초", secs, millis)
    } else {
        format!("{}ms", millis)
    }
}
