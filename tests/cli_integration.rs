use std::io::Write;
use std::path::Path;
use std::process::{Command, Output};

use cnpj_filter::config::CNPJ_COLUMNS;

/// One `;`-separated registry line; unnamed columns are empty.
fn registry_line(values: &[(&str, &str)]) -> String {
    CNPJ_COLUMNS
        .iter()
        .map(|column| {
            values
                .iter()
                .find(|(name, _)| name == column)
                .map(|(_, value)| format!("\"{}\"", value))
                .unwrap_or_else(|| "\"\"".to_string())
        })
        .collect::<Vec<_>>()
        .join(";")
}

fn write_registry(dir: &Path, rows: &[Vec<(&str, &str)>]) -> std::path::PathBuf {
    let path = dir.join("estabelecimentos.csv");
    let mut content = CNPJ_COLUMNS.join(";");
    content.push('\n');
    for row in rows {
        content.push_str(&registry_line(row));
        content.push('\n');
    }
    std::fs::write(&path, content).unwrap();
    path
}

fn sample_rows() -> Vec<Vec<(&'static str, &'static str)>> {
    vec![
        vec![
            ("CNPJ_BASICO", "11111111"),
            ("NOME_FANTASIA", "PADARIA MINEIRA"),
            ("UF", "MG"),
            ("CORREIO_ELETRONICO", "contato@padaria.com.br"),
            ("CNAE_FISCAL_SECUNDARIA", "4721102, 5611203"),
        ],
        vec![
            ("CNPJ_BASICO", "22222222"),
            ("NOME_FANTASIA", "LOJA PAULISTA"),
            ("UF", "SP"),
            ("CORREIO_ELETRONICO", "loja@empresa.com"),
        ],
        vec![
            ("CNPJ_BASICO", "33333333"),
            ("NOME_FANTASIA", "OFICINA"),
            ("UF", "mg"),
            ("CORREIO_ELETRONICO", "oficina@gmail.com"),
        ],
    ]
}

fn run(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_cnpj-filter"))
        .args(args)
        .output()
        .expect("failed to execute process")
}

#[test]
fn filters_rows_to_csv() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_registry(dir.path(), &sample_rows());
    let output = dir.path().join("out.csv");

    let result = run(&[
        "--input",
        input.to_str().unwrap(),
        "--output",
        output.to_str().unwrap(),
        "--filter",
        r#"UF = "MG" & !(CORREIO_ELETRONICO contains "@gmail")"#,
        "--verbose",
    ]);
    assert!(result.status.success(), "{}", String::from_utf8_lossy(&result.stderr));
    assert!(String::from_utf8_lossy(&result.stderr).contains("Matched 1 of 3 rows"));

    let content = std::fs::read_to_string(&output).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], CNPJ_COLUMNS.join(";"));
    assert!(lines[1].starts_with("11111111;"));
    assert!(lines[1].contains("PADARIA MINEIRA"));
}

#[test]
fn yaml_filter_to_jsonl() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_registry(dir.path(), &sample_rows());
    let output = dir.path().join("out.jsonl");
    let filters = dir.path().join("filters.yaml");
    std::fs::write(
        &filters,
        r#"
filter:
  any:
    - { field: CNAE_FISCAL_SECUNDARIA, op: eq, value: 5611203 }
    - { field: UF, op: eq, value: SP }
"#,
    )
    .unwrap();

    let result = run(&[
        "-i",
        input.to_str().unwrap(),
        "-o",
        output.to_str().unwrap(),
        "-f",
        filters.to_str().unwrap(),
    ]);
    assert!(result.status.success(), "{}", String::from_utf8_lossy(&result.stderr));

    let content = std::fs::read_to_string(&output).unwrap();
    let records: Vec<serde_json::Value> = content
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    let basicos: Vec<&str> = records
        .iter()
        .map(|r| r["CNPJ_BASICO"].as_str().unwrap())
        .collect();
    assert_eq!(basicos, vec!["11111111", "22222222"]);
}

#[test]
fn contacts_shape() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_registry(
        dir.path(),
        &[vec![
            ("CNPJ_BASICO", "123456"),
            ("CNPJ_ORDEM", "1"),
            ("CNPJ_DV", "9"),
            ("NOME_FANTASIA", "PADARIA"),
            ("TIPO_LOGRADOURO", "RUA"),
            ("LOGRADOURO", "DAS FLORES"),
            ("UF", "MG"),
            ("MUNICIPIO", "4123"),
            ("CEP", "30110000"),
            ("DDD_1", "31"),
            ("TELEFONE_1", "32145678"),
            ("CORREIO_ELETRONICO", "contato@padaria.com.br"),
        ]],
    );
    let municipalities = dir.path().join("municipios.csv");
    std::fs::write(&municipalities, "\"4123\";\"BELO HORIZONTE\"\n").unwrap();
    let output = dir.path().join("contacts.csv");

    let result = run(&[
        "--input",
        input.to_str().unwrap(),
        "--output",
        output.to_str().unwrap(),
        "--shape",
        "contacts",
        "--municipalities",
        municipalities.to_str().unwrap(),
    ]);
    assert!(result.status.success(), "{}", String::from_utf8_lossy(&result.stderr));

    let content = std::fs::read_to_string(&output).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(
        lines[0],
        "\"name\",\"cnpj\",\"website\",\"address\",\"address2\",\"numero\",\"bairro\",\"city\",\"state\",\"zip\",\"phone\",\"telefones_principais\",\"todos_os_telefones\",\"todos_os_e_mails\""
    );
    assert_eq!(
        lines[1],
        "\"PADARIA\",\"00123456000109\",\"padaria.com.br\",\"RUA DAS FLORES\",\"\",\"\",\"\",\"BELO HORIZONTE\",\"MG\",\"30110000\",\"3132145678\",\"3132145678\",\"3132145678\",\"contato@padaria.com.br\""
    );
}

#[test]
fn latin1_input_is_decoded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("latin1.csv");
    let text = format!(
        "{}\n{}\n{}\n",
        CNPJ_COLUMNS.join(";"),
        registry_line(&[("NOME_FANTASIA", "CAFÉ SÃO JOSÉ"), ("UF", "SP")]),
        registry_line(&[("NOME_FANTASIA", "AÇOUGUE"), ("UF", "SP")]),
    );
    let (bytes, _, _) = encoding_rs::WINDOWS_1252.encode(&text);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(&bytes).unwrap();
    drop(file);
    let output = dir.path().join("out.csv");

    let result = run(&[
        "--input",
        path.to_str().unwrap(),
        "--output",
        output.to_str().unwrap(),
        "--filter",
        "NOME_FANTASIA startswith 'café'",
    ]);
    assert!(result.status.success(), "{}", String::from_utf8_lossy(&result.stderr));

    let content = std::fs::read_to_string(&output).unwrap();
    assert_eq!(content.lines().count(), 2);
    assert!(content.contains("CAFÉ S"));
    assert!(!content.contains("OUGUE"));
}

#[test]
fn late_latin1_row_is_decoded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("late_latin1.csv");
    let mut text = CNPJ_COLUMNS.join(";");
    text.push('\n');
    for i in 0..400 {
        let basico = format!("{:08}", i);
        text.push_str(&registry_line(&[
            ("CNPJ_BASICO", basico.as_str()),
            ("NOME_FANTASIA", "EMPRESA"),
            ("UF", "SP"),
        ]));
        text.push('\n');
    }
    text.push_str(&registry_line(&[
        ("CNPJ_BASICO", "99999999"),
        ("NOME_FANTASIA", "CAFÉ SÃO JOSÉ"),
        ("UF", "MG"),
    ]));
    text.push('\n');
    let (bytes, _, _) = encoding_rs::WINDOWS_1252.encode(&text);
    std::fs::write(&path, &bytes).unwrap();
    let output = dir.path().join("out.csv");

    let result = run(&[
        "--input",
        path.to_str().unwrap(),
        "--output",
        output.to_str().unwrap(),
        "--filter",
        "NOME_FANTASIA contains 'SÃO'",
    ]);
    assert!(result.status.success(), "{}", String::from_utf8_lossy(&result.stderr));
    assert!(String::from_utf8_lossy(&result.stderr).contains("Matched 1 of 401 rows"));

    let content = std::fs::read_to_string(&output).unwrap();
    assert!(content.contains("CAFÉ SÃO JOSÉ"));
}

#[test]
fn configuration_error_aborts_before_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_registry(dir.path(), &sample_rows());
    let output = dir.path().join("out.csv");

    let result = run(&[
        "--input",
        input.to_str().unwrap(),
        "--output",
        output.to_str().unwrap(),
        "--filter",
        r#"NOPE = "x""#,
    ]);
    assert!(!result.status.success());
    assert!(String::from_utf8_lossy(&result.stderr).contains("unknown field 'NOPE'"));
    assert!(!output.exists());
}
