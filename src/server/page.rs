//! The upload form served at `/`.

use crate::config::{DocumentProfile, DEFAULT_DPI, MAX_DPI, MIN_DPI};

const TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="ko">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>PDF OCR</title>
<style>
  body { font-family: system-ui, sans-serif; max-width: 760px; margin: 2rem auto; padding: 0 1rem; color: #222; }
  fieldset { border: 1px solid #ddd; border-radius: 6px; margin-bottom: 1rem; }
  label { display: block; margin: .5rem 0 .2rem; }
  input[type=text], input[type=password], select { width: 100%; padding: .4rem; }
  button { padding: .5rem 1rem; margin-top: .8rem; }
  #status { margin-top: 1rem; white-space: pre-wrap; }
  #preview { width: 100%; height: 18rem; margin-top: .5rem; display: none; }
  .ok { color: #17702b; } .err { color: #b00020; }
</style>
</head>
<body>
<h1>PDF OCR</h1>
<p>스캔한 PDF에서 텍스트를 추출합니다.</p>

<form id="ocr-form">
  <fieldset>
    <legend>API 설정</legend>
    <label for="api_key">API 키</label>
    <input type="password" id="api_key" name="api_key" autocomplete="off">
    <button type="button" id="check-key">API 연결 테스트</button>
  </fieldset>

  <fieldset>
    <legend>처리 옵션</legend>
    <label for="profile">문서 유형</label>
    <select id="profile" name="profile">{{PROFILE_OPTIONS}}</select>

    <label for="format">출력 형식</label>
    <select id="format" name="format">
      <option value="txt">텍스트 파일</option>
      <option value="pdf">PDF 파일</option>
    </select>

    <label for="dpi">이미지 품질 (DPI): <output id="dpi-value">{{DPI_DEFAULT}}</output></label>
    <input type="range" id="dpi" name="dpi" min="{{DPI_MIN}}" max="{{DPI_MAX}}" step="50" value="{{DPI_DEFAULT}}">

    <input type="hidden" name="page_numbers" value="off">
    <label><input type="checkbox" name="page_numbers" value="on" checked> 페이지 번호 포함</label>
  </fieldset>

  <fieldset>
    <legend>PDF 파일</legend>
    <input type="file" id="file" name="file" accept="application/pdf,.pdf" required>
    <p><small>최대 {{MAX_UPLOAD_MB}}MB</small></p>
  </fieldset>

  <button type="submit" id="submit">텍스트 추출 시작</button>
</form>

<div id="status"></div>
<textarea id="preview" readonly></textarea>

<script>
const form = document.getElementById('ocr-form');
const status = document.getElementById('status');
const preview = document.getElementById('preview');
const dpi = document.getElementById('dpi');
dpi.addEventListener('input', () => { document.getElementById('dpi-value').textContent = dpi.value; });

function show(message, ok) {
  status.textContent = message;
  status.className = ok ? 'ok' : 'err';
}

async function errorMessage(response) {
  try { return (await response.json()).error.message; } catch (_) { return response.statusText; }
}

document.getElementById('check-key').addEventListener('click', async () => {
  const body = new FormData();
  body.append('api_key', document.getElementById('api_key').value);
  show('API 연결 확인 중...', true);
  const response = await fetch('/api/check-key', { method: 'POST', body });
  if (response.ok) show('API 연결 성공', true);
  else show('API 연결 실패: ' + await errorMessage(response), false);
});

form.addEventListener('submit', async (event) => {
  event.preventDefault();
  const button = document.getElementById('submit');
  button.disabled = true;
  preview.style.display = 'none';
  show('처리 중입니다. 페이지당 10-30초 정도 걸립니다...', true);
  try {
    const response = await fetch('/api/ocr', { method: 'POST', body: new FormData(form) });
    if (!response.ok) { show('처리 실패: ' + await errorMessage(response), false); return; }
    const blob = await response.blob();
    const disposition = response.headers.get('content-disposition') || '';
    const match = /filename\*=UTF-8''([^;]+)/.exec(disposition);
    const name = match ? decodeURIComponent(match[1]) : 'ocr_result';
    const link = document.createElement('a');
    link.href = URL.createObjectURL(blob);
    link.download = name;
    link.click();
    show('처리 완료: ' + name, true);
    if (name.endsWith('.txt')) {
      const text = await blob.text();
      preview.value = text.length > 2000 ? text.slice(0, 2000) + '...' : text;
      preview.style.display = 'block';
    }
  } catch (err) {
    show('처리 실패: ' + err, false);
  } finally {
    button.disabled = false;
  }
});
</script>
</body>
</html>
"#;

/// The form, with profile choices and limits filled in.
pub fn index_html(max_upload_mb: usize) -> String {
    let options: String = DocumentProfile::ALL
        .iter()
        .map(|p| format!(r#"<option value="{}">{}</option>"#, p.as_str(), p.label()))
        .collect();
    TEMPLATE
        .replace("{{PROFILE_OPTIONS}}", &options)
        .replace("{{DPI_MIN}}", &MIN_DPI.to_string())
        .replace("{{DPI_MAX}}", &MAX_DPI.to_string())
        .replace("{{DPI_DEFAULT}}", &DEFAULT_DPI.to_string())
        .replace("{{MAX_UPLOAD_MB}}", &max_upload_mb.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_profile_is_offered() {
        let html = index_html(200);
        for p in DocumentProfile::ALL {
            assert!(html.contains(&format!(r#"value="{}""#, p.as_str())));
        }
        assert!(!html.contains("{{"), "unfilled placeholder");
        assert!(html.contains(r#"min="150" max="600""#));
        assert!(html.contains("최대 200MB"));
    }
}
