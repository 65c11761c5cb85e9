use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

/// Generates a kubeconfig document from token-based auth parameters.
///
/// The output structure is fixed: existing stores contain kubeconfigs
/// produced by this exact template. When `insecure_skip_tls` is set the CA
/// field is omitted even if a certificate was supplied; a supplied CA is
/// base64-encoded unless it already is valid base64.
pub fn token_to_kubeconfig(
    cluster_name: &str,
    api_server: &str,
    token: &str,
    ca_cert: &str,
    insecure_skip_tls: bool,
) -> String {
    let mut kubeconfig = format!(
        "apiVersion: v1\nkind: Config\nclusters:\n- cluster:\n    server: {api_server}"
    );

    if insecure_skip_tls {
        kubeconfig.push_str("\n    insecure-skip-tls-verify: true");
    } else if !ca_cert.is_empty() {
        let ca_cert_base64 = if BASE64.decode(ca_cert).is_ok() {
            ca_cert.to_string()
        } else {
            BASE64.encode(ca_cert.as_bytes())
        };
        kubeconfig.push_str(&format!(
            "\n    certificate-authority-data: {ca_cert_base64}"
        ));
    }

    kubeconfig.push_str(&format!(
        "\n  name: {cluster_name}\ncontexts:\n- context:\n    cluster: {cluster_name}\n    user: {cluster_name}\n  name: {cluster_name}\ncurrent-context: {cluster_name}\nusers:\n- name: {cluster_name}\n  user:\n    token: {token}\n"
    ));

    kubeconfig
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_token_kubeconfig() {
        let config =
            token_to_kubeconfig("prod", "https://k8s.example.com:6443", "tok123", "", false);

        assert!(config.contains("server: https://k8s.example.com:6443"));
        assert!(config.contains("current-context: prod"));
        assert!(config.contains("token: tok123"));
        assert!(!config.contains("insecure-skip-tls-verify"));
        assert!(!config.contains("certificate-authority-data"));
    }

    #[test]
    fn insecure_omits_ca_even_when_supplied() {
        let config = token_to_kubeconfig("c", "https://k8s:6443", "t", "some-ca-data", true);

        assert!(config.contains("insecure-skip-tls-verify: true"));
        assert!(!config.contains("certificate-authority-data"));
    }

    #[test]
    fn raw_ca_is_base64_encoded() {
        let pem = "-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----";
        let config = token_to_kubeconfig("c", "https://k8s:6443", "t", pem, false);

        let expected = BASE64.encode(pem.as_bytes());
        assert!(config.contains(&format!("certificate-authority-data: {expected}")));
    }

    #[test]
    fn already_base64_ca_is_kept_verbatim() {
        let encoded = BASE64.encode(b"ca-bytes");
        let config = token_to_kubeconfig("c", "https://k8s:6443", "t", &encoded, false);

        assert!(config.contains(&format!("certificate-authority-data: {encoded}")));
    }

    #[test]
    fn output_parses_as_kubeconfig_yaml() {
        let config = token_to_kubeconfig("edge", "https://k8s:6443", "tok", "", true);
        let parsed = kube::config::Kubeconfig::from_yaml(&config).unwrap();

        assert_eq!(parsed.current_context.as_deref(), Some("edge"));
        assert_eq!(parsed.clusters.len(), 1);
        assert_eq!(
            parsed.clusters[0].cluster.as_ref().unwrap().server.as_deref(),
            Some("https://k8s:6443")
        );
        assert_eq!(
            parsed.clusters[0]
                .cluster
                .as_ref()
                .unwrap()
                .insecure_skip_tls_verify,
            Some(true)
        );
    }
}
