use wallpaper_contracts::settings::Language;
use wallpaper_engine::{ErrorKind, Notice};

pub fn error_title(language: Language) -> &'static str {
    match language {
        Language::En => "Error!",
        Language::Ar => "خطأ!",
    }
}

pub fn error_message(kind: ErrorKind, language: Language) -> &'static str {
    match (kind, language) {
        (ErrorKind::GenerationFailed, Language::En) => "An error occurred while generating the image. There might be a connection issue or the requested content is not allowed. Please try again.",
        (ErrorKind::GenerationFailed, Language::Ar) => "حدث خطأ أثناء إنشاء الصورة. قد تكون هناك مشكلة في الاتصال أو أن المحتوى المطلوب غير مسموح به. يرجى المحاولة مرة أخرى.",
        (ErrorKind::UpscaleFailed, Language::En) => "An error occurred while upscaling the image. Please try again.",
        (ErrorKind::UpscaleFailed, Language::Ar) => "حدث خطأ أثناء تحسين جودة الصورة. يرجى المحاولة مرة أخرى.",
    }
}

pub fn notice_message(notice: Notice, language: Language) -> &'static str {
    match (notice, language) {
        (Notice::EnhanceFailed, Language::En) => "Sorry, we couldn't enhance the prompt. Please try again.",
        (Notice::EnhanceFailed, Language::Ar) => "عذرًا، لم نتمكن من تحسين الوصف. يرجى المحاولة مرة أخرى.",
        (Notice::SuggestFailed, Language::En) => "Sorry, we couldn't suggest a prompt. Please try again.",
        (Notice::SuggestFailed, Language::Ar) => "عذرًا، لم نتمكن من اقتراح وصف. يرجى المحاولة مرة أخرى.",
        (Notice::ShareUnsupported, Language::En) => "Sharing is not available. Start with --share-dir to enable it.",
        (Notice::ShareUnsupported, Language::Ar) => "المشاركة غير متاحة. ابدأ باستخدام --share-dir لتفعيلها.",
        (Notice::ShareFailed, Language::En) => "An error occurred while trying to share.",
        (Notice::ShareFailed, Language::Ar) => "حدث خطأ أثناء محاولة المشاركة.",
    }
}

pub fn clear_history_confirm(language: Language) -> &'static str {
    match language {
        Language::En => "Are you sure you want to delete all history? This action cannot be undone.",
        Language::Ar => "هل أنت متأكد أنك تريد حذف كل السجل؟ لا يمكن التراجع عن هذا الإجراء.",
    }
}

#[cfg(test)]
mod tests {
    use wallpaper_contracts::settings::Language;
    use wallpaper_engine::{ErrorKind, Notice};

    use super::{error_message, notice_message};

    #[test]
    fn every_message_is_localized() {
        for kind in [ErrorKind::GenerationFailed, ErrorKind::UpscaleFailed] {
            assert_ne!(
                error_message(kind, Language::En),
                error_message(kind, Language::Ar)
            );
        }
        for notice in [
            Notice::EnhanceFailed,
            Notice::SuggestFailed,
            Notice::ShareUnsupported,
            Notice::ShareFailed,
        ] {
            assert_ne!(
                notice_message(notice, Language::En),
                notice_message(notice, Language::Ar)
            );
        }
    }
}
