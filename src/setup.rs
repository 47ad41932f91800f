//! Interactive setup wizard
//!
//! Walks the operator through the Azure app registration, asks for the
//! client and tenant ids, and writes the configuration record.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use serde_json::json;

use crate::config::graph::REDIRECT_URI;
use crate::config::ConfigRecord;
use crate::error::{GraphMcpError, Result, SetupError};

/// How the wizard ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupOutcome {
    /// The operator has not finished the portal steps yet
    Declined,

    /// The configuration record was written to this path
    Saved(PathBuf),
}

/// Setup wizard over any line-based input and output
pub struct SetupWizard<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> SetupWizard<R, W> {
    /// Create a wizard reading answers from `input` and printing to `output`
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Run every step in order, writing the record to `config_path`
    pub fn run(&mut self, config_path: &Path) -> Result<SetupOutcome> {
        self.print_instructions()?;

        let proceed = self.ask("Você já completou essas etapas? (s/n): ")?;
        if !proceed.trim().eq_ignore_ascii_case("s") {
            writeln!(
                self.output,
                "\nComplete as etapas acima e execute novamente este comando."
            )?;
            return Ok(SetupOutcome::Declined);
        }

        writeln!(self.output, "\n--- Configuração ---\n")?;

        let client_id = self.ask_required("Digite o Client ID: ")?;
        let tenant_id = self.ask_required("Digite o Tenant ID: ")?;

        let record = ConfigRecord::new(client_id, tenant_id);
        record.save(config_path)?;
        tracing::info!(path = %config_path.display(), "Configuration saved");

        writeln!(self.output, "\nConfiguração salva com sucesso!")?;
        writeln!(self.output, "Arquivo: {}", config_path.display())?;
        self.print_next_steps()?;

        Ok(SetupOutcome::Saved(config_path.to_path_buf()))
    }

    /// Prompt once and return the raw answer without its line ending
    fn ask(&mut self, prompt: &str) -> Result<String> {
        write!(self.output, "{}", prompt)?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(GraphMcpError::Setup(SetupError::InputClosed));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    /// Prompt until a non-blank answer is given
    fn ask_required(&mut self, prompt: &str) -> Result<String> {
        loop {
            let answer = self.ask(prompt)?;
            let answer = answer.trim();
            if !answer.is_empty() {
                return Ok(answer.to_string());
            }
            writeln!(self.output, "Valor obrigatório, tente novamente.")?;
        }
    }

    fn print_instructions(&mut self) -> Result<()> {
        let out = &mut self.output;
        writeln!(out, "=== Configuração do Servidor MCP Outlook ===\n")?;

        writeln!(out, "Para configurar este servidor, você precisará:")?;
        writeln!(out, "1. Um Azure App Registration")?;
        writeln!(out, "2. Client ID e Tenant ID da aplicação")?;
        writeln!(out, "3. Permissões configuradas no Azure AD\n")?;

        writeln!(out, "Siga estas etapas no Azure Portal:")?;
        writeln!(out, "1. Acesse https://portal.azure.com")?;
        writeln!(out, "2. Vá para Azure Active Directory > App registrations")?;
        writeln!(out, "3. Clique em \"New registration\"")?;
        writeln!(out, "4. Nome: \"MCP Outlook Server\"")?;
        writeln!(
            out,
            "5. Supported account types: \"Accounts in this organizational directory only\""
        )?;
        writeln!(
            out,
            "6. Redirect URI: Public client/native (mobile & desktop) - {}",
            REDIRECT_URI
        )?;
        writeln!(
            out,
            "7. Após criar, anote o Application (client) ID e Directory (tenant) ID\n"
        )?;

        writeln!(out, "8. Em \"API permissions\", adicione:")?;
        writeln!(out, "   - Microsoft Graph > Delegated permissions:")?;
        for permission in [
            "Mail.Read",
            "Mail.ReadWrite",
            "Mail.Send",
            "Calendars.Read",
            "Calendars.ReadWrite",
            "User.Read",
        ] {
            writeln!(out, "     * {}", permission)?;
        }
        writeln!(
            out,
            "9. Clique em \"Grant admin consent\" (pode precisar de um admin)\n"
        )?;

        writeln!(out, "10. Em \"Authentication\":")?;
        writeln!(
            out,
            "    - Certifique-se que \"{}\" está nas Redirect URIs",
            REDIRECT_URI
        )?;
        writeln!(out, "    - Em \"Advanced settings\", habilite \"Allow public client flows\"\n")?;
        Ok(())
    }

    fn print_next_steps(&mut self) -> Result<()> {
        let out = &mut self.output;
        writeln!(out, "\n--- Próximos passos ---\n")?;

        writeln!(out, "1. Configure o Claude Desktop:")?;
        writeln!(
            out,
            "   Adicione ao arquivo de configuração do Claude Desktop:"
        )?;
        writeln!(
            out,
            "   (normalmente em %APPDATA%/Claude/claude_desktop_config.json)\n"
        )?;
        writeln!(out, "{}", serde_json::to_string_pretty(&host_snippet())?)?;

        writeln!(out, "\n2. Reinicie o Claude Desktop")?;
        writeln!(
            out,
            "\n3. Na primeira execução, uma janela do navegador abrirá para autenticação"
        )?;
        writeln!(
            out,
            "   Faça login com sua conta corporativa do Office 365 (ou rode 'outlook-mcp-server auth' antes)\n"
        )?;
        Ok(())
    }
}

/// Host configuration entry registering this server
pub fn host_snippet() -> serde_json::Value {
    json!({
        "mcpServers": {
            "outlook": {
                "command": "outlook-mcp-server",
                "args": [],
                "env": {}
            }
        }
    })
}
