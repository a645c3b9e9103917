use wallpaper_contracts::settings::{style_fragment, Language};

pub const UPSCALE_INSTRUCTION: &str = "Take this image and upscale it to 8K resolution. Sharpen the details, enhance the lighting and colors, and improve the overall quality to a cinematic masterpiece level without changing the subject or composition. Make it incredibly clear and detailed.";

/// Text-only assistant requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssistantTask {
    Enhance { prompt: String },
    Suggest,
}

impl AssistantTask {
    pub fn label(&self) -> &'static str {
        match self {
            AssistantTask::Enhance { .. } => "enhance",
            AssistantTask::Suggest => "suggest",
        }
    }
}

pub fn text_to_image_prompt(prompt: &str, style: &str) -> String {
    format!(
        "Masterpiece anime wallpaper of: \"{prompt}\".\n\
         Style: {}\n\
         Quality: 8k resolution, ultra-high quality, trending on ArtStation.\n\
         Mood: Evoke a powerful emotion suitable for a wallpaper.",
        style_fragment(style)
    )
}

pub fn image_edit_prompt(prompt: &str) -> String {
    format!(
        "Using the provided image as a base, create a new masterpiece by applying the following changes: \"{prompt}\". Enhance the image with vibrant colors, cinematic lighting, and highly detailed elements. Output in 8k resolution."
    )
}

pub fn assistant_instruction(task: &AssistantTask, language: Language) -> String {
    match (task, language) {
        (AssistantTask::Enhance { prompt }, Language::En) => format!(
            "Transform this simple idea into a rich description full of visual details, lighting, and emotion to create an AI art piece. Make the description in English. The idea is: \"{prompt}\""
        ),
        (AssistantTask::Enhance { prompt }, Language::Ar) => format!(
            "حوّل هذه الفكرة البسيطة إلى وصف غني بالتفاصيل البصرية والإضاءة والمشاعر لإنشاء صورة فنية بالذكاء الاصطناعي. اجعل الوصف باللغة العربية. الفكرة هي: \"{prompt}\""
        ),
        (AssistantTask::Suggest, Language::En) => {
            "Suggest a new and creative idea for an artistic anime wallpaper prompt.".to_string()
        }
        (AssistantTask::Suggest, Language::Ar) => {
            "اقترح فكرة جديدة ومبتكرة لوصف خلفية أنمي فنية.".to_string()
        }
    }
}

pub fn assistant_system_role(task: &AssistantTask, language: Language) -> &'static str {
    match (task, language) {
        (AssistantTask::Enhance { .. }, Language::En) => "You are a creative assistant specializing in writing artistic prompts for image generation software. Your task is to transform users' simple ideas into rich, inspiring descriptions. The output should be only the enhanced prompt, without any introductions or extra phrases.",
        (AssistantTask::Enhance { .. }, Language::Ar) => "أنت مساعد إبداعي متخصص في كتابة أوصاف فنية لبرامج توليد الصور. مهمتك هي تحويل أفكار المستخدمين البسيطة إلى أوصاف غنية وملهمة. يجب أن يكون الناتج هو الوصف المحسّن فقط، بدون أي مقدمات أو عبارات إضافية.",
        (AssistantTask::Suggest, Language::En) => "You are a creative assistant specializing in generating inspiring ideas for artistic images. Your task is to suggest a single, unique, and innovative description in English. The output should be only the suggested prompt, without any preambles or phrases like 'Sure, here you go:'.",
        (AssistantTask::Suggest, Language::Ar) => "أنت مساعد إبداعي متخصص في توليد أفكار ملهمة لصور فنية. مهمتك هي اقتراح وصف واحد فريد ومبتكر باللغة العربية. يجب أن يكون الناتج هو الوصف المقترح فقط، بدون أي مقدمات أو عبارات إضافية مثل 'بالتأكيد، تفضل:'.",
    }
}
