//! 테스트 실행마다 고유한 이름 생성
//!
//! 네임스페이스와 Helm 릴리스 이름은 DNS-1123 라벨이어야 하므로 모두 소문자입니다.

use uuid::Uuid;

/// 고유 ID 길이
const UNIQUE_ID_LEN: usize = 6;

/// 6자리 소문자 16진수 ID를 생성합니다.
///
/// UUID v4의 앞 6자리이므로 `[0-9a-f]`만 사용합니다 (16^6 조합).
pub fn unique_id() -> String {
    Uuid::new_v4().simple().to_string()[..UNIQUE_ID_LEN].to_owned()
}

/// `{prefix}-{unique_id}` 형식의 소문자 이름을 생성합니다.
pub fn unique_name(prefix: &str) -> String {
    format!("{}-{}", prefix.to_lowercase(), unique_id())
}
