//! System prompt assembly.
//!
//! Deterministic string composition in a fixed section order. Same agent
//! configuration and same context chunks always produce byte-identical
//! output — replies depend on the model's sampling, never on prompt
//! assembly.

use konsul_core::agent::{AgentProfile, CommunicationStyle, FieldKind, JobKind};

/// Instruction for each communication style.
fn style_instruction(style: CommunicationStyle) -> &'static str {
    match style {
        CommunicationStyle::Formal => {
            "Mantén un tono formal y profesional en todas tus respuestas. \
             Dirígete al usuario de usted."
        }
        CommunicationStyle::Normal => {
            "Mantén un tono claro y cercano, profesional pero sin rigidez."
        }
        CommunicationStyle::Casual => {
            "Usa un tono casual y relajado, como si hablaras con un amigo."
        }
    }
}

/// Job-type framing, optionally naming the company.
fn job_framing(agent: &AgentProfile) -> String {
    let company = agent
        .job
        .company
        .as_deref()
        .filter(|c| !c.trim().is_empty());

    let mut framing = match agent.job.kind {
        JobKind::Support => {
            let mut s = String::from("Eres un agente de atención al cliente");
            if let Some(company) = company {
                s.push_str(&format!(" de {company}"));
            }
            s.push_str(
                ". Tu prioridad es resolver las dudas y problemas del usuario \
                 con claridad y paciencia.",
            );
            s
        }
        JobKind::Sales => {
            let mut s = String::from("Eres un asesor de ventas");
            if let Some(company) = company {
                s.push_str(&format!(" de {company}"));
            }
            s.push_str(
                ". Tu objetivo es entender lo que el usuario necesita y guiarlo \
                 hacia la mejor opción, sin presionar.",
            );
            s
        }
        JobKind::Personal => {
            let mut s = String::from("Eres un asistente personal");
            if let Some(company) = company {
                s.push_str(&format!(" para {company}"));
            }
            s.push_str(". Ayuda al usuario a organizar sus pendientes y resolver lo que necesite.");
            s
        }
    };

    if let Some(website) = agent.job.website.as_deref().filter(|w| !w.trim().is_empty()) {
        framing.push_str(&format!(" Sitio web: {website}."));
    }

    framing
}

/// Assemble the full system prompt from agent configuration and retrieved
/// knowledge chunks.
///
/// Section order is fixed: style, personality, job framing, job description,
/// knowledge, topic restriction, emoji directive, signature, message
/// splitting, human transfer, field collection. Empty sections are omitted
/// entirely; the result is trimmed.
pub fn build_system_prompt(agent: &AgentProfile, context_chunks: &[String]) -> String {
    let mut sections: Vec<String> = Vec::new();

    // 1. Communication style
    sections.push(style_instruction(agent.style).to_string());

    // 2. Personality, verbatim
    if !agent.personality.is_empty() {
        sections.push(agent.personality.clone());
    }

    // 3. Job framing
    sections.push(job_framing(agent));

    // 4. Job description
    if let Some(description) = agent
        .job
        .description
        .as_deref()
        .filter(|d| !d.trim().is_empty())
    {
        sections.push(description.to_string());
    }

    // 5. Retrieved knowledge, numbered; omitted entirely when empty
    if !context_chunks.is_empty() {
        let mut block = String::from("CONOCIMIENTO ADICIONAL:");
        for (i, chunk) in context_chunks.iter().enumerate() {
            block.push_str(&format!("\n{}. {}", i + 1, chunk));
        }
        sections.push(block);
    }

    // 6. Topic restriction
    if agent.flags.restrict_topics {
        sections.push(
            "Limítate estrictamente a temas relacionados con tu función y el negocio. \
             Si el usuario pregunta por temas ajenos, redirige la conversación con amabilidad."
                .to_string(),
        );
    }

    // 7. Emoji directive — negative instruction only; nothing when enabled
    if !agent.flags.allow_emojis {
        sections.push("No utilices emojis en tus respuestas.".to_string());
    }

    // 8. Signature
    if agent.flags.sign_messages {
        sections.push(format!("Firma tus mensajes como {}.", agent.name));
    }

    // 9. Message splitting
    if agent.flags.split_long_messages {
        sections.push(
            "Si la respuesta es larga, divídela en varios mensajes cortos \
             separados por una línea en blanco."
                .to_string(),
        );
    }

    // 10. Human transfer
    if agent.flags.transfer_to_human {
        sections.push(
            "Si el usuario pide hablar con una persona o no puedes resolver su problema, \
             indícale que transferirás la conversación a un agente humano."
                .to_string(),
        );
    }

    // 11. Field collection contract
    if !agent.custom_fields.is_empty() {
        let mut block = String::from(
            "DATOS A RECOPILAR:\n\
             Durante la conversación intenta conseguir los siguientes datos del usuario. \
             Cuando obtengas alguno, llama a la herramienta update_contact usando la clave indicada.",
        );
        for field in &agent.custom_fields {
            block.push_str(&format!("\n- {} (clave: {})", field.label, field.key));
            if !field.description.is_empty() {
                block.push_str(&format!(": {}", field.description));
            }
            if field.kind == FieldKind::Select && !field.options.is_empty() {
                block.push_str(&format!(" Opciones válidas: {}.", field.options.join(", ")));
            }
        }
        block.push_str(
            "\nSi la respuesta del usuario no coincide exactamente con una opción válida, \
             elige la opción más cercana; si hay ambigüedad, pide una aclaración.",
        );
        sections.push(block);
    }

    sections.join("\n\n").trim().to_string()
}
