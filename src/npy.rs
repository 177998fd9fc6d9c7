//! .npy 디코딩 모듈
//!
//! 헤더의 `descr` 값을 먼저 확인해 원소 타입을 고른 뒤,
//! `ndarray-npy`로 실제 배열을 역직렬화합니다.

use ndarray::{ArrayD, IxDyn};
use ndarray_npy::ReadNpyExt;
use num_complex::Complex;
use py_literal::Value as PyValue;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// .npy 포맷의 매직 문자열
const MAGIC_STRING: &[u8] = b"\x93NUMPY";

/// 매직 문자열 + 버전 바이트 수
const PREAMBLE_LEN: usize = MAGIC_STRING.len() + 2;

/// .npy 디코딩 에러
#[derive(Error, Debug)]
pub enum NpyError {
    #[error("매직 문자열이 일치하지 않습니다")]
    MagicString,

    #[error("알 수 없는 .npy 버전: {major}.{minor}")]
    Version { major: u8, minor: u8 },

    #[error("헤더가 잘렸습니다 (필요: {needed} 바이트, 실제: {actual} 바이트)")]
    Truncated { needed: usize, actual: usize },

    #[error("헤더가 줄바꿈으로 끝나지 않습니다")]
    MissingNewline,

    #[error("헤더 문자열 인코딩이 올바르지 않습니다")]
    HeaderEncoding,

    #[error("헤더 딕셔너리 파싱 실패: {0}")]
    HeaderDict(String),

    #[error("헤더에 문자열 'descr' 키가 없습니다")]
    MissingDescr,

    #[error("지원하지 않는 원소 타입: {0}")]
    UnsupportedElementType(String),

    #[error("배열 데이터 읽기 실패: {0}")]
    Data(String),
}

/// 지원하는 원소 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Bool,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
    Complex64,
    Complex128,
}

impl ElementKind {
    /// NumPy `descr` 문자열에서 원소 타입 결정
    ///
    /// 바이트 순서 접두사(`<`, `>`, `|`, `=`)는 무시합니다.
    ///
    /// # Examples
    /// ```
    /// use npy2mat::npy::ElementKind;
    ///
    /// assert_eq!(ElementKind::from_descr("<f4"), Some(ElementKind::Float32));
    /// assert_eq!(ElementKind::from_descr("|b1"), Some(ElementKind::Bool));
    /// assert_eq!(ElementKind::from_descr("<f2"), None);
    /// ```
    pub fn from_descr(descr: &str) -> Option<Self> {
        let code = match descr.as_bytes().first() {
            Some(b'<' | b'>' | b'|' | b'=') => &descr[1..],
            _ => descr,
        };

        let kind = match code {
            "b1" | "?" => ElementKind::Bool,
            "i1" => ElementKind::Int8,
            "u1" => ElementKind::UInt8,
            "i2" => ElementKind::Int16,
            "u2" => ElementKind::UInt16,
            "i4" => ElementKind::Int32,
            "u4" => ElementKind::UInt32,
            "i8" => ElementKind::Int64,
            "u8" => ElementKind::UInt64,
            "f4" => ElementKind::Float32,
            "f8" => ElementKind::Float64,
            "c8" => ElementKind::Complex64,
            "c16" => ElementKind::Complex128,
            _ => return None,
        };
        Some(kind)
    }

    /// 원소 하나의 바이트 크기
    pub fn size(&self) -> usize {
        match self {
            ElementKind::Bool | ElementKind::Int8 | ElementKind::UInt8 => 1,
            ElementKind::Int16 | ElementKind::UInt16 => 2,
            ElementKind::Int32 | ElementKind::UInt32 | ElementKind::Float32 => 4,
            ElementKind::Int64
            | ElementKind::UInt64
            | ElementKind::Float64
            | ElementKind::Complex64 => 8,
            ElementKind::Complex128 => 16,
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElementKind::Bool => "bool",
            ElementKind::Int8 => "int8",
            ElementKind::UInt8 => "uint8",
            ElementKind::Int16 => "int16",
            ElementKind::UInt16 => "uint16",
            ElementKind::Int32 => "int32",
            ElementKind::UInt32 => "uint32",
            ElementKind::Int64 => "int64",
            ElementKind::UInt64 => "uint64",
            ElementKind::Float32 => "float32",
            ElementKind::Float64 => "float64",
            ElementKind::Complex64 => "complex64",
            ElementKind::Complex128 => "complex128",
        };
        write!(f, "{}", name)
    }
}

/// 메모리에 디코딩된 배열
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayPayload {
    Bool(ArrayD<bool>),
    Int8(ArrayD<i8>),
    UInt8(ArrayD<u8>),
    Int16(ArrayD<i16>),
    UInt16(ArrayD<u16>),
    Int32(ArrayD<i32>),
    UInt32(ArrayD<u32>),
    Int64(ArrayD<i64>),
    UInt64(ArrayD<u64>),
    Float32(ArrayD<f32>),
    Float64(ArrayD<f64>),
    Complex64(ArrayD<Complex<f32>>),
    Complex128(ArrayD<Complex<f64>>),
}

/// 모든 변형에 같은 식을 적용
macro_rules! for_each_array {
    ($payload:expr, $arr:ident => $body:expr) => {
        match $payload {
            ArrayPayload::Bool($arr) => $body,
            ArrayPayload::Int8($arr) => $body,
            ArrayPayload::UInt8($arr) => $body,
            ArrayPayload::Int16($arr) => $body,
            ArrayPayload::UInt16($arr) => $body,
            ArrayPayload::Int32($arr) => $body,
            ArrayPayload::UInt32($arr) => $body,
            ArrayPayload::Int64($arr) => $body,
            ArrayPayload::UInt64($arr) => $body,
            ArrayPayload::Float32($arr) => $body,
            ArrayPayload::Float64($arr) => $body,
            ArrayPayload::Complex64($arr) => $body,
            ArrayPayload::Complex128($arr) => $body,
        }
    };
}

/// 변형마다 같은 식으로 새 페이로드 생성
macro_rules! map_each_array {
    ($payload:expr, $arr:ident => $body:expr) => {
        match $payload {
            ArrayPayload::Bool($arr) => ArrayPayload::Bool($body),
            ArrayPayload::Int8($arr) => ArrayPayload::Int8($body),
            ArrayPayload::UInt8($arr) => ArrayPayload::UInt8($body),
            ArrayPayload::Int16($arr) => ArrayPayload::Int16($body),
            ArrayPayload::UInt16($arr) => ArrayPayload::UInt16($body),
            ArrayPayload::Int32($arr) => ArrayPayload::Int32($body),
            ArrayPayload::UInt32($arr) => ArrayPayload::UInt32($body),
            ArrayPayload::Int64($arr) => ArrayPayload::Int64($body),
            ArrayPayload::UInt64($arr) => ArrayPayload::UInt64($body),
            ArrayPayload::Float32($arr) => ArrayPayload::Float32($body),
            ArrayPayload::Float64($arr) => ArrayPayload::Float64($body),
            ArrayPayload::Complex64($arr) => ArrayPayload::Complex64($body),
            ArrayPayload::Complex128($arr) => ArrayPayload::Complex128($body),
        }
    };
}

impl ArrayPayload {
    /// 원소 타입
    pub fn kind(&self) -> ElementKind {
        match self {
            ArrayPayload::Bool(_) => ElementKind::Bool,
            ArrayPayload::Int8(_) => ElementKind::Int8,
            ArrayPayload::UInt8(_) => ElementKind::UInt8,
            ArrayPayload::Int16(_) => ElementKind::Int16,
            ArrayPayload::UInt16(_) => ElementKind::UInt16,
            ArrayPayload::Int32(_) => ElementKind::Int32,
            ArrayPayload::UInt32(_) => ElementKind::UInt32,
            ArrayPayload::Int64(_) => ElementKind::Int64,
            ArrayPayload::UInt64(_) => ElementKind::UInt64,
            ArrayPayload::Float32(_) => ElementKind::Float32,
            ArrayPayload::Float64(_) => ElementKind::Float64,
            ArrayPayload::Complex64(_) => ElementKind::Complex64,
            ArrayPayload::Complex128(_) => ElementKind::Complex128,
        }
    }

    pub fn shape(&self) -> &[usize] {
        for_each_array!(self, arr => arr.shape())
    }

    /// 전체 원소 수
    pub fn len(&self) -> usize {
        for_each_array!(self, arr => arr.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 논리적(행 우선) 원소 순서를 유지한 채 모양만 바꾼 복사본
    ///
    /// 원소 수가 맞지 않으면 `None`을 반환합니다.
    pub fn reshaped(&self, dims: &[usize]) -> Option<ArrayPayload> {
        if dims.iter().product::<usize>() != self.len() {
            return None;
        }
        let reshaped = map_each_array!(self, arr => {
            ArrayD::from_shape_vec(IxDyn(dims), arr.iter().cloned().collect()).ok()?
        });
        Some(reshaped)
    }
}

/// .npy 헤더에서 미리 읽어 둔 정보
#[derive(Debug, Clone, PartialEq)]
pub struct NpyHeader {
    /// (major, minor) 포맷 버전
    pub version: (u8, u8),
    /// 원본 `descr` 문자열 (예: `<f4`)
    pub descr: String,
    pub fortran_order: bool,
}

impl NpyHeader {
    /// 바이트열 앞부분의 헤더만 해석
    pub fn peek(bytes: &[u8]) -> Result<Self, NpyError> {
        if bytes.len() < MAGIC_STRING.len() || &bytes[..MAGIC_STRING.len()] != MAGIC_STRING {
            return Err(NpyError::MagicString);
        }
        ensure_len(bytes, PREAMBLE_LEN)?;

        let (major, minor) = (bytes[6], bytes[7]);
        let (header_len, start) = match major {
            1 => {
                ensure_len(bytes, PREAMBLE_LEN + 2)?;
                (
                    u16::from_le_bytes([bytes[8], bytes[9]]) as usize,
                    PREAMBLE_LEN + 2,
                )
            }
            2 | 3 => {
                ensure_len(bytes, PREAMBLE_LEN + 4)?;
                (
                    u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize,
                    PREAMBLE_LEN + 4,
                )
            }
            _ => return Err(NpyError::Version { major, minor }),
        };
        ensure_len(bytes, start + header_len)?;

        let raw = &bytes[start..start + header_len];
        let without_newline = match raw.split_last() {
            Some((&b'\n', rest)) => rest,
            _ => return Err(NpyError::MissingNewline),
        };
        if major < 3 && !without_newline.is_ascii() {
            return Err(NpyError::HeaderEncoding);
        }
        let header_str =
            std::str::from_utf8(without_newline).map_err(|_| NpyError::HeaderEncoding)?;

        let dict = header_str
            .parse::<PyValue>()
            .map_err(|e| NpyError::HeaderDict(e.to_string()))?;

        let mut descr = None;
        let mut fortran_order = false;
        if let PyValue::Dict(entries) = dict {
            for (key, value) in entries {
                match (key, value) {
                    (PyValue::String(k), PyValue::String(v)) if k == "descr" => descr = Some(v),
                    (PyValue::String(k), PyValue::List(_)) if k == "descr" => {
                        return Err(NpyError::UnsupportedElementType(
                            "structured dtype".to_string(),
                        ))
                    }
                    (PyValue::String(k), PyValue::Boolean(b)) if k == "fortran_order" => {
                        fortran_order = b
                    }
                    _ => {}
                }
            }
        } else {
            return Err(NpyError::HeaderDict("헤더가 딕셔너리가 아닙니다".to_string()));
        }

        Ok(Self {
            version: (major, minor),
            descr: descr.ok_or(NpyError::MissingDescr)?,
            fortran_order,
        })
    }

    /// `descr`에 대응하는 원소 타입
    pub fn element_kind(&self) -> Result<ElementKind, NpyError> {
        ElementKind::from_descr(&self.descr)
            .ok_or_else(|| NpyError::UnsupportedElementType(self.descr.clone()))
    }
}

fn ensure_len(bytes: &[u8], needed: usize) -> Result<(), NpyError> {
    if bytes.len() < needed {
        Err(NpyError::Truncated {
            needed,
            actual: bytes.len(),
        })
    } else {
        Ok(())
    }
}

/// .npy 바이트열 전체를 배열로 디코딩
///
/// # Arguments
/// * `bytes` - .npy 파일 내용
///
/// # Returns
/// 원소 타입에 맞는 `ArrayPayload`
pub fn decode_npy(bytes: &[u8]) -> Result<ArrayPayload, NpyError> {
    let header = NpyHeader::peek(bytes)?;

    macro_rules! read_as {
        ($variant:ident, $elem:ty) => {
            ArrayPayload::$variant(
                ArrayD::<$elem>::read_npy(bytes).map_err(|e| NpyError::Data(e.to_string()))?,
            )
        };
    }

    let payload = match header.element_kind()? {
        ElementKind::Bool => read_as!(Bool, bool),
        ElementKind::Int8 => read_as!(Int8, i8),
        ElementKind::UInt8 => read_as!(UInt8, u8),
        ElementKind::Int16 => read_as!(Int16, i16),
        ElementKind::UInt16 => read_as!(UInt16, u16),
        ElementKind::Int32 => read_as!(Int32, i32),
        ElementKind::UInt32 => read_as!(UInt32, u32),
        ElementKind::Int64 => read_as!(Int64, i64),
        ElementKind::UInt64 => read_as!(UInt64, u64),
        ElementKind::Float32 => read_as!(Float32, f32),
        ElementKind::Float64 => read_as!(Float64, f64),
        ElementKind::Complex64 => read_as!(Complex64, Complex<f32>),
        ElementKind::Complex128 => read_as!(Complex128, Complex<f64>),
    };

    Ok(payload)
}
