//! 배치 변환 모듈
//!
//! 입력 폴더의 .npy 파일을 하나씩 .mat 파일로 변환하고
//! 파일별 결과와 전체 실행 결과를 만듭니다.
//! 이 모듈은 화면에 아무것도 출력하지 않으며, 결과는 콜백과 반환값으로만 전달합니다.

use memmap2::Mmap;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use walkdir::WalkDir;

use crate::cli::WriteMode;
use crate::error::{FileFailure, Npy2MatError, Result};
use crate::mat::{mat_dims, read_mat, write_mat};
use crate::npy::{decode_npy, ArrayPayload, ElementKind, NpyError};
use crate::pattern::PatternMatcher;

/// 원본 확장자
pub const SOURCE_EXTENSION: &str = "npy";
/// 대상 확장자
pub const DESTINATION_EXTENSION: &str = "mat";

/// 변환할 원본 파일 하나
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceArrayFile {
    pub path: PathBuf,
    /// 확장자를 뺀 파일 이름 (출력 파일 이름과 변수 이름에 사용)
    pub base_name: String,
}

impl SourceArrayFile {
    pub fn new(path: PathBuf) -> Self {
        let base_name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { path, base_name }
    }

    /// 로그에 표시할 파일 이름
    pub fn file_name(&self) -> String {
        display_name(&self.path)
    }

    /// 출력 폴더 안의 대상 경로
    ///
    /// 확장자만 `.mat`으로 바꾸므로 `a.npy`와 `a.NPY`는 같은 대상이 됩니다.
    pub fn destination_in(&self, output_dir: &Path) -> PathBuf {
        let file_name = self.path.file_name().unwrap_or_default();
        output_dir.join(Path::new(file_name).with_extension(DESTINATION_EXTENSION))
    }
}

/// 대용량 파일 기본 임계값 (10MB)
const DEFAULT_MMAP_THRESHOLD: u64 = 10 * 1024 * 1024;

/// 변환 옵션
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// 출력 파일이 이미 있을 때의 동작
    pub write_mode: WriteMode,
    /// 파일 이름 glob 필터
    pub pattern: Option<String>,
    /// 고정 변수 이름 (None이면 파일 이름 사용)
    pub variable_name: Option<String>,
    /// 기록 후 다시 읽어 검증
    pub verify: bool,
    /// 대용량 파일 임계값 (이상이면 메모리 매핑 사용)
    pub mmap_threshold: u64,
    /// 설정되면 다음 파일부터 시작하지 않음
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            write_mode: WriteMode::default(),
            pattern: None,
            variable_name: None,
            verify: false,
            mmap_threshold: DEFAULT_MMAP_THRESHOLD,
            cancel: None,
        }
    }
}

impl ConvertOptions {
    /// 기본 옵션 생성
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_write_mode(mut self, write_mode: WriteMode) -> Self {
        self.write_mode = write_mode;
        self
    }

    pub fn with_pattern(mut self, pattern: Option<String>) -> Self {
        self.pattern = pattern;
        self
    }

    pub fn with_variable_name(mut self, variable_name: Option<String>) -> Self {
        self.variable_name = variable_name;
        self
    }

    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    pub fn with_mmap_threshold(mut self, mmap_threshold: u64) -> Self {
        self.mmap_threshold = mmap_threshold;
        self
    }

    /// 취소 플래그 연결
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// 파일 하나의 변환 결과
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionResult {
    pub source: PathBuf,
    pub success: bool,
    /// 기록된 .mat 경로 (성공 시, 검사 모드에서는 None)
    pub destination: Option<PathBuf>,
    /// 실패 정보 (실패 시)
    pub failure: Option<FileFailure>,
    pub element_kind: Option<ElementKind>,
    pub shape: Option<Vec<usize>>,
    /// 원본 파일 크기
    pub bytes_read: u64,
    /// 기록한 파일 크기
    pub bytes_written: u64,
}

impl ConversionResult {
    /// 성공 결과 생성
    pub fn success(
        source: PathBuf,
        destination: Option<PathBuf>,
        payload: &ArrayPayload,
        bytes_read: u64,
        bytes_written: u64,
    ) -> Self {
        Self {
            source,
            success: true,
            destination,
            failure: None,
            element_kind: Some(payload.kind()),
            shape: Some(payload.shape().to_vec()),
            bytes_read,
            bytes_written,
        }
    }

    /// 실패 결과 생성
    pub fn failure(source: PathBuf, failure: FileFailure, bytes_read: u64) -> Self {
        Self {
            source,
            success: false,
            destination: None,
            failure: Some(failure),
            element_kind: None,
            shape: None,
            bytes_read,
            bytes_written: 0,
        }
    }

    /// 디코딩까지는 성공한 배열 정보 추가
    fn with_array(mut self, payload: &ArrayPayload) -> Self {
        self.element_kind = Some(payload.kind());
        self.shape = Some(payload.shape().to_vec());
        self
    }

    pub fn file_name(&self) -> String {
        display_name(&self.source)
    }

    /// 로그 한 줄 (파일 이름, 결과, 실패 사유)
    pub fn log_line(&self) -> String {
        match (&self.failure, &self.destination) {
            (Some(failure), _) => {
                format!("✗ {} [{}] {}", self.file_name(), failure.kind, failure.message)
            }
            (None, Some(destination)) => format!(
                "✓ {} → {}{}",
                self.file_name(),
                display_name(destination),
                self.array_summary()
            ),
            (None, None) => format!("✓ {}{}", self.file_name(), self.array_summary()),
        }
    }

    fn array_summary(&self) -> String {
        match (&self.element_kind, &self.shape) {
            (Some(kind), Some(shape)) => format!(" ({} {:?})", kind, shape),
            _ => String::new(),
        }
    }
}

/// 한 번의 배치 실행 결과
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConversionRun {
    pub input_dir: PathBuf,
    pub output_dir: Option<PathBuf>,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// 열거 순서대로의 파일별 결과
    pub results: Vec<ConversionResult>,
    /// 확장자나 패턴이 맞지 않아 건너뛴 파일
    pub skipped: Vec<PathBuf>,
    /// 취소되어 일부 파일을 시작하지 않음
    pub cancelled: bool,
    pub elapsed: Duration,
}

impl ConversionRun {
    fn new(plan: &ConversionPlan, output_dir: Option<&Path>) -> Self {
        Self {
            input_dir: plan.input_dir.clone(),
            output_dir: output_dir.map(Path::to_path_buf),
            skipped: plan.skipped.clone(),
            ..Default::default()
        }
    }

    fn push(&mut self, result: ConversionResult) {
        self.attempted += 1;
        if result.success {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        self.results.push(result);
    }

    /// 실패한 결과만
    pub fn failures(&self) -> impl Iterator<Item = &ConversionResult> {
        self.results.iter().filter(|r| !r.success)
    }

    pub fn total_bytes_read(&self) -> u64 {
        self.results.iter().map(|r| r.bytes_read).sum()
    }

    pub fn total_bytes_written(&self) -> u64 {
        self.results.iter().map(|r| r.bytes_written).sum()
    }

    /// 마지막 요약 한 줄
    pub fn summary_line(&self) -> String {
        let mut line = format!(
            "변환 완료: {}/{} 성공, 실패 {}",
            self.succeeded, self.attempted, self.failed
        );
        if !self.skipped.is_empty() {
            line.push_str(&format!(", 건너뜀 {}", self.skipped.len()));
        }
        if self.cancelled {
            line.push_str(" (취소됨)");
        }
        line
    }
}

/// 실행 전에 열거한 파일 목록
#[derive(Debug, Clone, Default)]
pub struct ConversionPlan {
    pub input_dir: PathBuf,
    /// 파일 이름 순으로 정렬된 변환 대상
    pub sources: Vec<SourceArrayFile>,
    pub skipped: Vec<PathBuf>,
}

/// 배치 변환기
#[derive(Debug)]
pub struct Converter {
    options: ConvertOptions,
    pattern: PatternMatcher,
}

impl Converter {
    /// 옵션을 검사하고 변환기 생성
    pub fn new(options: ConvertOptions) -> Result<Self> {
        if let Some(ref name) = options.variable_name {
            if !is_valid_variable_name(name) {
                return Err(Npy2MatError::InvalidVariableName { name: name.clone() });
            }
        }
        let pattern = PatternMatcher::new(options.pattern.clone())?;
        Ok(Self { options, pattern })
    }

    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    /// 입력 폴더를 검사하고 변환 대상 열거
    ///
    /// 하위 폴더는 탐색하지 않으며, 순서는 파일 이름순입니다.
    pub fn plan(&self, input_dir: &Path) -> Result<ConversionPlan> {
        check_input_dir(input_dir)?;

        let mut plan = ConversionPlan {
            input_dir: input_dir.to_path_buf(),
            ..Default::default()
        };

        let walker = WalkDir::new(input_dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by(|a, b| a.file_name().cmp(b.file_name()));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => match unreadable_entry(e.depth(), e.path()) {
                    Some(path) => {
                        plan.skipped.push(path);
                        continue;
                    }
                    None => {
                        return Err(Npy2MatError::DirectoryUnreadable {
                            path: input_dir.to_path_buf(),
                            reason: e.to_string(),
                        })
                    }
                },
            };

            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            let eligible = has_source_extension(path) && self.name_matches(path);

            if eligible {
                plan.sources.push(SourceArrayFile::new(path.to_path_buf()));
            } else {
                plan.skipped.push(path.to_path_buf());
            }
        }

        Ok(plan)
    }

    /// 입력 폴더의 모든 .npy 파일을 출력 폴더에 .mat으로 변환
    pub fn convert(&self, input_dir: &Path, output_dir: &Path) -> Result<ConversionRun> {
        self.convert_with(input_dir, output_dir, |_| {})
    }

    /// 결과가 나올 때마다 `on_result`를 호출하며 변환
    pub fn convert_with<F>(
        &self,
        input_dir: &Path,
        output_dir: &Path,
        on_result: F,
    ) -> Result<ConversionRun>
    where
        F: FnMut(&ConversionResult),
    {
        let plan = self.plan(input_dir)?;
        self.execute(&plan, output_dir, on_result)
    }

    /// 열거된 목록으로 변환 실행
    ///
    /// 출력 폴더는 필요하면 생성합니다. 파일별 실패는 결과에 기록되고
    /// 다음 파일 처리는 계속됩니다.
    pub fn execute<F>(
        &self,
        plan: &ConversionPlan,
        output_dir: &Path,
        on_result: F,
    ) -> Result<ConversionRun>
    where
        F: FnMut(&ConversionResult),
    {
        prepare_output_dir(output_dir)?;
        let run = ConversionRun::new(plan, Some(output_dir));
        Ok(self.run_each(plan, run, on_result, |source| {
            self.convert_one(source, output_dir)
        }))
    }

    /// 쓰기 없이 디코딩만 검사
    pub fn validate_with<F>(&self, plan: &ConversionPlan, on_result: F) -> ConversionRun
    where
        F: FnMut(&ConversionResult),
    {
        let run = ConversionRun::new(plan, None);
        self.run_each(plan, run, on_result, |source| self.validate_one(source))
    }

    fn run_each<F, S>(
        &self,
        plan: &ConversionPlan,
        mut run: ConversionRun,
        mut on_result: F,
        mut step: S,
    ) -> ConversionRun
    where
        F: FnMut(&ConversionResult),
        S: FnMut(&SourceArrayFile) -> ConversionResult,
    {
        let start = Instant::now();

        for source in &plan.sources {
            if self.is_cancelled() {
                run.cancelled = true;
                break;
            }
            let result = step(source);
            on_result(&result);
            run.push(result);
        }

        run.elapsed = start.elapsed();
        run
    }

    /// 패턴 필터 검사 (UTF-8이 아닌 이름은 손실 변환 후 비교)
    fn name_matches(&self, path: &Path) -> bool {
        if !self.pattern.has_pattern() {
            return true;
        }
        path.file_name()
            .map(|s| self.pattern.matches(&s.to_string_lossy()))
            .unwrap_or(false)
    }

    fn is_cancelled(&self) -> bool {
        self.options
            .cancel
            .as_ref()
            .map(|flag| flag.load(Ordering::Relaxed))
            .unwrap_or(false)
    }

    /// 단일 파일 변환
    ///
    /// # Arguments
    /// * `source` - 변환할 .npy 파일
    /// * `output_dir` - .mat 파일을 쓸 폴더 (이미 존재해야 함)
    ///
    /// # Returns
    /// 성공/실패가 담긴 `ConversionResult` (에러는 전파하지 않음)
    pub fn convert_one(&self, source: &SourceArrayFile, output_dir: &Path) -> ConversionResult {
        let bytes_read = file_size(&source.path);

        let payload = match self.decode(source, bytes_read) {
            Ok(payload) => payload,
            Err(e) => return ConversionResult::failure(source.path.clone(), e.into(), bytes_read),
        };

        let destination = source.destination_in(output_dir);
        match self.encode(source, &payload, &destination) {
            Ok(bytes_written) => ConversionResult::success(
                source.path.clone(),
                Some(destination),
                &payload,
                bytes_read,
                bytes_written,
            ),
            Err(e) => ConversionResult::failure(source.path.clone(), e.into(), bytes_read)
                .with_array(&payload),
        }
    }

    /// 단일 파일 디코딩 검사
    pub fn validate_one(&self, source: &SourceArrayFile) -> ConversionResult {
        let bytes_read = file_size(&source.path);
        match self.decode(source, bytes_read) {
            Ok(payload) => {
                ConversionResult::success(source.path.clone(), None, &payload, bytes_read, 0)
            }
            Err(e) => ConversionResult::failure(source.path.clone(), e.into(), bytes_read),
        }
    }

    /// 변수 이름 (고정 이름이 없으면 파일 이름)
    pub fn variable_name<'a>(&'a self, source: &'a SourceArrayFile) -> &'a str {
        self.options
            .variable_name
            .as_deref()
            .unwrap_or(&source.base_name)
    }

    fn decode(&self, source: &SourceArrayFile, size: u64) -> Result<ArrayPayload> {
        let bytes = read_source(&source.path, size, self.options.mmap_threshold)?;

        decode_npy(&bytes).map_err(|e| match e {
            NpyError::UnsupportedElementType(descr) => Npy2MatError::UnsupportedElementType {
                file: source.path.clone(),
                descr,
            },
            other => Npy2MatError::Decode {
                file: source.path.clone(),
                reason: other.to_string(),
            },
        })
    }

    fn encode(
        &self,
        source: &SourceArrayFile,
        payload: &ArrayPayload,
        destination: &Path,
    ) -> Result<u64> {
        if self.options.write_mode == WriteMode::Error && destination.exists() {
            return Err(Npy2MatError::DestinationExists {
                path: destination.to_path_buf(),
            });
        }

        let encode_error = |reason: String| Npy2MatError::Encode {
            file: destination.to_path_buf(),
            reason,
        };

        let name = self.variable_name(source);
        let file = File::create(destination).map_err(|e| encode_error(e.to_string()))?;
        write_mat(BufWriter::new(file), name, payload).map_err(|e| encode_error(e.to_string()))?;

        if self.options.verify {
            verify_mat(destination, name, payload)?;
        }

        Ok(file_size(destination))
    }
}

/// 기본 옵션으로 변환
pub fn convert(input_dir: &Path, output_dir: &Path) -> Result<ConversionRun> {
    Converter::new(ConvertOptions::new())?.convert(input_dir, output_dir)
}

/// 기록한 .mat 파일을 다시 읽어 원본과 비교
pub fn verify_mat(path: &Path, name: &str, payload: &ArrayPayload) -> Result<()> {
    let verify_error = |reason: String| Npy2MatError::Verify {
        file: path.to_path_buf(),
        reason,
    };

    let file = File::open(path).map_err(|e| verify_error(e.to_string()))?;
    let variables = read_mat(BufReader::new(file)).map_err(|e| verify_error(e.to_string()))?;

    let variable = match variables.as_slice() {
        [single] => single,
        other => return Err(verify_error(format!("변수 수가 {}개입니다", other.len()))),
    };
    if variable.name != name {
        return Err(verify_error(format!(
            "변수 이름 불일치: {:?} != {:?}",
            variable.name, name
        )));
    }

    let expected = payload
        .reshaped(&mat_dims(payload.shape()))
        .ok_or_else(|| verify_error("차원 변환 실패".to_string()))?;
    if variable.data.kind() != expected.kind() {
        return Err(verify_error(format!(
            "원소 타입 불일치: {} != {}",
            variable.data.kind(),
            expected.kind()
        )));
    }
    if variable.data.shape() != expected.shape() {
        return Err(verify_error(format!(
            "모양 불일치: {:?} != {:?}",
            variable.data.shape(),
            expected.shape()
        )));
    }
    if variable.data != expected {
        return Err(verify_error("값이 일치하지 않습니다".to_string()));
    }

    Ok(())
}

/// 입력 폴더 검사
pub fn check_input_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(Npy2MatError::InputNotFound {
            path: path.to_path_buf(),
        });
    }
    if !path.is_dir() {
        return Err(Npy2MatError::NotADirectory {
            path: path.to_path_buf(),
        });
    }
    fs::read_dir(path).map_err(|e| Npy2MatError::DirectoryUnreadable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(())
}

/// 출력 폴더 준비 (없으면 생성)
///
/// 폴더 안에 임시 파일을 만들고 지워 실제로 쓸 수 있는지 확인합니다.
pub fn prepare_output_dir(path: &Path) -> Result<()> {
    let unavailable = |reason: String| Npy2MatError::OutputUnavailable {
        path: path.to_path_buf(),
        reason,
    };

    if !path.exists() {
        fs::create_dir_all(path).map_err(|e| unavailable(e.to_string()))?;
    }

    let metadata = fs::metadata(path).map_err(|e| unavailable(e.to_string()))?;
    if !metadata.is_dir() {
        return Err(unavailable("폴더가 아닙니다".to_string()));
    }

    let scratch = path.join(format!(".npy2mat-write-check-{}", std::process::id()));
    File::create(&scratch).map_err(|e| unavailable(format!("쓰기 권한이 없습니다: {}", e)))?;
    fs::remove_file(&scratch).map_err(|e| unavailable(e.to_string()))?;
    Ok(())
}

/// MATLAB 변수 이름 규칙 검사 (영문자로 시작, 영숫자와 `_`, 최대 63자)
pub fn is_valid_variable_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    name.len() <= 63 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// 열거 중 읽지 못한 항목
///
/// 폴더 안의 항목 하나면 건너뛴 목록에 넣을 경로를, 폴더 자체면 `None`을 반환합니다.
fn unreadable_entry(depth: usize, path: Option<&Path>) -> Option<PathBuf> {
    match path {
        Some(path) if depth > 0 => Some(path.to_path_buf()),
        _ => None,
    }
}

fn has_source_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|s| s.eq_ignore_ascii_case(SOURCE_EXTENSION))
        .unwrap_or(false)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn file_size(path: &Path) -> u64 {
    fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

/// 읽어 들인 원본 바이트 (작은 파일은 메모리, 큰 파일은 매핑)
enum SourceBytes {
    Owned(Vec<u8>),
    Mapped(Mmap),
}

impl Deref for SourceBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            SourceBytes::Owned(bytes) => bytes,
            SourceBytes::Mapped(mmap) => mmap,
        }
    }
}

fn read_source(path: &Path, size: u64, mmap_threshold: u64) -> Result<SourceBytes> {
    let open_error = |reason: String| Npy2MatError::Decode {
        file: path.to_path_buf(),
        reason,
    };

    if size >= mmap_threshold && size > 0 {
        // 대용량 파일: 메모리 매핑 사용
        let file = File::open(path).map_err(|e| open_error(e.to_string()))?;
        let mmap = unsafe {
            Mmap::map(&file).map_err(|e| open_error(format!("메모리 매핑 실패: {}", e)))?
        };
        Ok(SourceBytes::Mapped(mmap))
    } else {
        fs::read(path)
            .map(SourceBytes::Owned)
            .map_err(|e| open_error(e.to_string()))
    }
}
