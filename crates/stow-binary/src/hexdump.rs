/// Render bytes as a classic offset / hex / ASCII dump, 16 bytes per line.
pub fn hex_dump(data: &[u8]) -> String {
    let mut out = String::new();
    for (line, chunk) in data.chunks(16).enumerate() {
        let encoded = hex::encode(chunk);
        let mut groups: Vec<&str> = Vec::with_capacity(16);
        for i in (0..encoded.len()).step_by(2) {
            groups.push(&encoded[i..i + 2]);
        }
        let ascii: String = chunk
            .iter()
            .map(|b| if b.is_ascii_graphic() || *b == b' ' { *b as char } else { '.' })
            .collect();
        out.push_str(&format!("{:08x}  {:<47}  |{ascii}|\n", line * 16, groups.join(" ")));
    }
    out
}
